pub mod error_reporter;
pub mod interpreter;
pub mod persister;
pub mod prompt;
pub mod subject;
pub mod trigger_matcher;

pub use error_reporter::ErrorReporter;
pub use interpreter::{FunctionCallInterpreter, Interpretation, RejectedInvocation, ResultState, ToolCall};
pub use persister::{PersistOutcome, PipelineContext, ResultPersister};
pub use prompt::PromptRenderer;
pub use subject::Subject;
pub use trigger_matcher::{MatchedTrigger, TriggerMatcher};
