pub mod analyser;
pub mod collector;
pub mod components;
pub mod reasoning;
pub mod registry;

pub use analyser::{
    bootstrap_analyser, AnalyserService, AnalyserSettings, ListenEnd, PipelineOutcome,
};
pub use collector::{CollectedItem, CollectorService, CollectorSource, JsonLinesSource};
pub use components::{
    ErrorReporter, FunctionCallInterpreter, PromptRenderer, ResultPersister, ResultState,
    Subject, ToolCall, TriggerMatcher,
};
pub use reasoning::{OpenAiReasoningClient, SYSTEM_PROMPT, TOOLSET_VERSION};
pub use registry::{AnalyserWorker, CollectorWorker, WorkerHandle, WorkerRegistry};
