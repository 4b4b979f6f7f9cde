pub mod analyzers;
pub mod indicators;
pub mod ranking;
pub mod simulator;
pub mod strategy;
