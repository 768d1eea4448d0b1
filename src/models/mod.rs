pub mod company;
pub mod detection;
pub mod job;
