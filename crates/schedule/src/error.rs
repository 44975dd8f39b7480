use devbench_graph::GraphError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScheduleError>;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}
