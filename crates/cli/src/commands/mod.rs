pub mod run;
pub mod shared;
pub mod simulate;

pub use run::RunArgs;
pub use simulate::SimulateArgs;
