use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message} - line {line}: {text}")]
    Parse {
        message: String,
        line: usize,
        text: String,
    },

    #[error("could not create tri-strips for mesh '{mesh}'")]
    StripifyFailed { mesh: String },

    #[error("mesh '{mesh}' has {count} unique vertices, too many for 16-bit indices")]
    TooManyVertices { mesh: String, count: usize },

    #[error("mesh '{mesh}' references material {id} but the material table has no such entry")]
    UnknownMaterial { mesh: String, id: usize },

    #[error("mesh '{mesh}' totals overflow 16 bits: {strip_verts} strip points, {triangles} triangles")]
    ShapeTooLarge {
        mesh: String,
        strip_verts: usize,
        triangles: usize,
    },
}

impl ModelError {
    /// Line-numbered parse error carrying the offending line text.
    pub fn parse(message: impl Into<String>, line: usize, text: &str) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            text: text.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
