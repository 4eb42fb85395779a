pub mod encoders;
pub mod export;
pub mod mask;
pub mod track;
