pub mod cash_flow;
pub mod inputs;

pub use cash_flow::{project_cash_flows, CashFlowProjection, PeriodProjection, RefinanceEvent};
pub use inputs::{
    CapitalEvent, ExpenseLineItem, FinancingTerms, GrowthAssumptions, ManagementFeeBasis,
    RefinanceTerms, ScenarioInputs,
};
