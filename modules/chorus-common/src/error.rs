use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChorusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persona error: {0}")]
    Persona(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
