pub mod analyze;
pub mod contract;
pub mod summarize;

pub use analyze::{
    CitedAnalysis, GroundedAnalysis, analyze_company_gemini, analyze_company_perplexity,
};
pub use contract::{
    AwardContext, ContractResearch, GaoResearch, ToolsResearch, research_contract, research_gao,
    research_tools,
};
pub use summarize::{Summary, summarize};
