pub mod capture;
pub mod detection;
pub mod gate;
pub mod photo;
pub mod removal;
pub mod shared;
