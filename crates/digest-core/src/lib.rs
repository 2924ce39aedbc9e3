// Public modules
pub mod aggregator;
pub mod assembler;
pub mod config;
pub mod context;
pub mod delivery;
pub mod error;
pub mod io;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod sources;
pub mod synthesis;

// Re-export commonly used types
pub use aggregator::{Aggregator, ConfiguredSource};
pub use assembler::BriefingAssembler;
pub use config::{Credentials, DigestConfig, SourceSpec, SynthesisProvider};
pub use context::{ContextBuilder, SynthesisContext};
pub use delivery::{DeliveryChannel, DryRunChannel, ResendChannel};
pub use error::{
    AssemblyWarning, DeliveryError, RunError, SourceError, SourceErrorKind, SynthesisError,
    SynthesisErrorKind,
};
pub use io::{briefing_stem, get_default_output_dir, save_briefing};
pub use models::{Briefing, BriefingSection, Bundle, ContentItem, SourceKind};
pub use pipeline::{Pipeline, RunReport};
pub use render::{BriefingRenderer, RenderedBriefing};
pub use sources::{ArxivConnector, NewsApiConnector, RawItem, SourceConnector};
pub use synthesis::{AnthropicSynthesizer, GeminiSynthesizer, SynthesisInvoker};
