mod execute;
mod prepare;
mod row;

pub(crate) use execute::Execute;
pub(crate) use prepare::{Prepare, PrepareOk, StmtClose};
pub(crate) use row::BinaryRow;
