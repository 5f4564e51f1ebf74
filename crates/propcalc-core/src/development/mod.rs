pub mod phases;

pub use phases::{
    phase_windows, schedule_development, ConstructionLoan, DevelopmentInput, DevelopmentOutput,
    DevelopmentPeriod, Phase, PhaseWindow,
};
