use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage a shader error refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        })
    }
}

/// Failure compiling or linking the shader program.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{message}")]
    Compile { stage: Stage, message: String },

    #[error("{stage} shader has no `{entry_point}` entry point")]
    MissingEntryPoint {
        stage: Stage,
        entry_point: &'static str,
    },

    #[error("vertex shader input at location {location} is not provided by the vertex buffer")]
    UnboundAttribute { location: u32 },

    #[error("vertex buffer attribute at location {location} is not consumed by the vertex shader")]
    UnusedAttribute { location: u32 },

    #[error("fragment shader input at location {location} is not written by the vertex shader")]
    UnlinkedVarying { location: u32 },

    #[error("uniform `{name}` is not declared by the program")]
    MissingUniform { name: &'static str },

    #[error("uniform `{name}` must be a {expected}")]
    UniformType {
        name: &'static str,
        expected: &'static str,
    },

    #[error("uniform `{name}` is bound to group {group}; only group 0 is supported")]
    UnsupportedGroup { name: &'static str, group: u32 },
}

/// Failure loading the texture image.
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to load texture {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("texture {} has no pixels ({width}x{height})", path.display())]
    Empty {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("texture {} is {width}x{height}; the device allows at most {max} per side", path.display())]
    TooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max: u32,
    },
}
