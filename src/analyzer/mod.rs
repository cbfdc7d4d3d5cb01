//! Analyzer adapters
//!
//! Every analyzer sits behind `AnalyzerAdapter` and speaks the canonical
//! vocabulary. Native analyzers plug in through a `TagScheme`; the
//! rule-based decliner needs no external model.

mod adapter;
mod decliner;
mod scheme;
mod traits;

pub use adapter::SchemeAdapter;
pub use decliner::RuleDecliner;
pub use scheme::{IttbXposScheme, TagScheme, UdScheme};
pub use traits::{
    AnalyzerAdapter, AnalyzerError, AnalyzerRegistry, NativeAnalysis, NativeAnalyzer,
    RegisteredAnalyzer,
};
