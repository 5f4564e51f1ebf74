pub mod amortization;
pub mod deal;
pub mod development;
pub mod irr;
pub mod rental;
pub mod sensitivity;
pub mod strategies;
