use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("Cannot merge an empty list of graphs")]
    EmptyMerge,
}
