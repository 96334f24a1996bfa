//! 提示词模板渲染
//!
//! 模板是 Jinja 语法，唯一的绑定变量是 `payload`：`{{ payload.a.b }}`、`{{ payload['x'] }}`、
//! 过滤器和 `{% if %}` 等语句都可以使用。未定义的变量渲染为空字符串，
//! 对象与数组渲染为紧凑 JSON。

use minijinja::value::ValueKind;
use minijinja::{context, Environment, UndefinedBehavior};
use serde_json::Value;
use silvermoon_domain::entities::{AnalysisTask, AnalysisTaskTrigger, JsonMap};
use silvermoon_errors::{SilvermoonError, SilvermoonResult};
use tracing::debug;

pub const PROMPT_PARAMETER: &str = "prompt";

pub struct PromptRenderer {
    env: Environment<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_formatter(|out, state, value| match value.kind() {
            ValueKind::Undefined => {
                debug!("模板变量未定义，渲染为空字符串");
                Ok(())
            }
            ValueKind::None => Ok(()),
            ValueKind::Map | ValueKind::Seq => {
                let json = serde_json::to_string(value).map_err(|e| {
                    minijinja::Error::new(
                        minijinja::ErrorKind::InvalidOperation,
                        format!("无法序列化为 JSON: {e}"),
                    )
                })?;
                out.write_str(&json).map_err(|_| {
                    minijinja::Error::new(minijinja::ErrorKind::WriteFailure, "写入渲染结果失败")
                })
            }
            _ => minijinja::escape_formatter(out, state, value),
        });
        Self { env }
    }

    /// 取出触发器的 prompt 参数，触发器未提供时回退到任务参数
    pub fn template<'a>(
        task: &'a AnalysisTask,
        trigger: &'a AnalysisTaskTrigger,
    ) -> SilvermoonResult<&'a str> {
        match task.parameter(trigger, PROMPT_PARAMETER) {
            Some(Value::String(template)) => Ok(template),
            Some(other) => Err(SilvermoonError::InvalidTemplateParameter {
                parameter: PROMPT_PARAMETER.to_string(),
                message: format!("期望字符串，实际为 {other}"),
            }),
            None => Err(SilvermoonError::MissingTemplateParameter {
                parameter: PROMPT_PARAMETER.to_string(),
            }),
        }
    }

    /// 以 `payload` 为唯一绑定变量渲染模板；语法错误和渲染错误都是 `InvalidTemplateParameter`
    pub fn render(&self, template: &str, payload: &JsonMap) -> SilvermoonResult<String> {
        self.env
            .render_str(template, context! { payload => payload })
            .map_err(|e| SilvermoonError::InvalidTemplateParameter {
                parameter: PROMPT_PARAMETER.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use silvermoon_errors::ErrorKind;
    use uuid::Uuid;

    fn payload(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_simple_field() {
        let renderer = PromptRenderer::new();
        let rendered = renderer
            .render(
                "Summarise: {{ payload.text }}",
                &payload(json!({"text": "hello"})),
            )
            .unwrap();
        assert_eq!(rendered, "Summarise: hello");
    }

    #[test]
    fn test_render_nested_paths_and_values() {
        let renderer = PromptRenderer::new();
        let data = payload(json!({
            "message": {"author": {"name": "ada"}, "views": 42, "pinned": true},
            "tags": ["rust", "tokio"],
            "meta": {"a": 1}
        }));
        let render = |template: &str| renderer.render(template, &data).unwrap();

        assert_eq!(
            render("{{payload.message.author.name}} / {{ payload.message.views }}"),
            "ada / 42"
        );
        assert_eq!(render("{{ payload.message.pinned }}"), "true");
        assert_eq!(render("{{ payload.tags[1] }}"), "tokio");
        assert_eq!(render("{{ payload.meta }}"), r#"{"a":1}"#);
        assert_eq!(render("{{ payload.tags }}"), r#"["rust","tokio"]"#);
        assert_eq!(
            renderer
                .render("{{ payload }}", &payload(json!({"x": "y"})))
                .unwrap(),
            r#"{"x":"y"}"#
        );
    }

    #[test]
    fn test_render_jinja_expressions() {
        let renderer = PromptRenderer::new();
        let data = payload(json!({"text": "hello", "urgent": true, "items": ["a", "b"]}));
        let render = |template: &str| renderer.render(template, &data).unwrap();

        assert_eq!(render("S: {{ payload.text | upper }}"), "S: HELLO");
        assert_eq!(render("{{ payload['text'] }}"), "hello");
        assert_eq!(
            render("{% if payload.urgent %}URGENT: {% endif %}{{ payload.text }}"),
            "URGENT: hello"
        );
        assert_eq!(
            render("{% for item in payload.items %}[{{ item }}]{% endfor %}"),
            "[a][b]"
        );
        assert_eq!(render("{{ payload.items | length }}"), "2");
    }

    #[test]
    fn test_undefined_paths_render_empty() {
        let renderer = PromptRenderer::new();
        let data = payload(json!({"text": "hello", "nothing": null}));
        let render = |template: &str| renderer.render(template, &data).unwrap();

        assert_eq!(render("[{{ payload.missing }}]"), "[]");
        assert_eq!(render("[{{ payload.missing.deeper }}]"), "[]");
        assert_eq!(render("[{{ payload.text.deeper }}]"), "[]");
        assert_eq!(render("[{{ other.text }}]"), "[]");
        assert_eq!(render("[{{ payload.nothing }}]"), "[]");
        assert_eq!(render("no placeholders"), "no placeholders");
    }

    #[test]
    fn test_broken_templates_are_data_errors() {
        let renderer = PromptRenderer::new();
        let data = payload(json!({"text": "hello"}));

        for template in [
            "Summarise: {{ payload.text",
            "{% if payload.text %}unterminated",
            "{{ payload.text | no_such_filter }}",
        ] {
            let err = renderer.render(template, &data).unwrap_err();
            assert!(
                matches!(err, SilvermoonError::InvalidTemplateParameter { ref parameter, .. } if parameter == "prompt"),
                "{template}: {err}"
            );
            assert_eq!(err.kind(), ErrorKind::Data);
        }
    }

    #[test]
    fn test_template_lookup() {
        let source = Uuid::new_v4();
        let mut task = AnalysisTask::new("t", Uuid::new_v4());
        let bare = AnalysisTaskTrigger::new(vec![], source);

        let err = PromptRenderer::template(&task, &bare).unwrap_err();
        assert!(matches!(err, SilvermoonError::MissingTemplateParameter { .. }));

        let numeric = bare.clone().with_parameter("prompt", json!(5));
        assert!(matches!(
            PromptRenderer::template(&task, &numeric).unwrap_err(),
            SilvermoonError::InvalidTemplateParameter { .. }
        ));

        task.parameters.insert("prompt".to_string(), json!("task level"));
        assert_eq!(PromptRenderer::template(&task, &bare).unwrap(), "task level");

        let own = bare.with_parameter("prompt", json!("trigger level"));
        assert_eq!(PromptRenderer::template(&task, &own).unwrap(), "trigger level");
    }
}
