use silvermoon_config::TopicFilterMode;
use silvermoon_domain::entities::{AnalysisTask, AnalysisTaskTrigger};
use silvermoon_domain::events::BusMessage;
use tracing::debug;
use uuid::Uuid;

/// 一次匹配：任务、触发器及其在任务中的序号
#[derive(Debug, Clone, Copy)]
pub struct MatchedTrigger<'a> {
    pub task: &'a AnalysisTask,
    pub trigger: &'a AnalysisTaskTrigger,
    pub trigger_index: usize,
}

/// 根据事件名与来源 worker 选出应当触发的 (任务, 触发器)
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerMatcher {
    topic_filter: TopicFilterMode,
}

impl TriggerMatcher {
    pub fn new(topic_filter: TopicFilterMode) -> Self {
        Self { topic_filter }
    }

    pub fn topic_filter(&self) -> TopicFilterMode {
        self.topic_filter
    }

    /// 是否有任意触发器接受该事件，不考虑主题
    pub fn any_candidate(&self, tasks: &[AnalysisTask], message: &BusMessage) -> bool {
        tasks.iter().any(|task| {
            task.triggers
                .iter()
                .any(|t| t.accepts(message.event_name, message.source_worker_uuid))
        })
    }

    /// 按任务顺序、任务内按触发器声明顺序惰性产出匹配项
    ///
    /// `subject_topics` 只在 `Enforce` 模式下参与判断。
    pub fn matches<'a>(
        &self,
        tasks: &'a [AnalysisTask],
        message: &BusMessage,
        subject_topics: &'a [Uuid],
    ) -> impl Iterator<Item = MatchedTrigger<'a>> + 'a {
        let message = *message;
        let topic_filter = self.topic_filter;

        tasks.iter().flat_map(move |task| {
            task.triggers
                .iter()
                .enumerate()
                .filter(move |(_, trigger)| {
                    trigger.accepts(message.event_name, message.source_worker_uuid)
                })
                .filter(move |(index, trigger)| {
                    let passes = Self::topics_pass(topic_filter, trigger, subject_topics);
                    if !passes {
                        debug!(
                            "触发器 {}#{} 的主题与主体通道不匹配，跳过",
                            task.name, index
                        );
                    }
                    passes
                })
                .map(move |(trigger_index, trigger)| MatchedTrigger {
                    task,
                    trigger,
                    trigger_index,
                })
        })
    }

    fn topics_pass(
        topic_filter: TopicFilterMode,
        trigger: &AnalysisTaskTrigger,
        subject_topics: &[Uuid],
    ) -> bool {
        match topic_filter {
            TopicFilterMode::Ignore => true,
            TopicFilterMode::Enforce => {
                trigger.topics.is_empty()
                    || trigger.topics.iter().any(|t| subject_topics.contains(t))
            }
        }
    }
}
