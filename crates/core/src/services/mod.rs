pub mod compare;
pub mod inspect;
pub mod operands;
pub mod orchestrator;
pub mod process;
pub mod runner;
