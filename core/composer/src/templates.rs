use daylife_schemas::{DetailedPlanView, PlanView};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Fixed home/work address text appended to the place narrative at extraction
#[derive(Debug, Clone, Default)]
pub struct Addresses {
    pub home: String,
    pub work: String,
}

impl Addresses {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.home.is_empty() {
            lines.push(format!("家庭住址：{}", self.home));
        }
        if !self.work.is_empty() {
            lines.push(format!("工作地址：{}", self.work));
        }
        lines.join("\n")
    }
}

/// Renders the prompts of the daily pipeline stages
#[derive(Debug, Clone, Default)]
pub struct PromptRenderer;

impl PromptRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Stage 1: how the persona feels about the day ahead
    pub fn subjective(
        &self,
        cognition: &str,
        memory: &str,
        thought: &str,
        plan: &PlanView,
        date: &str,
        persona: &Value,
    ) -> String {
        let lines = vec![
            "你正在扮演下面这个人，请以第一人称写出今天开始前的主观想法与打算。".to_string(),
            section("人物设定", &render_value(persona)),
            section("自我认知", cognition),
            section("记忆", memory),
            section("此前的想法", thought),
            section("今天的计划", &to_json(plan)),
            section("日期", date),
            "要求：只写内心独白，不要编造计划之外的重大事件。".to_string(),
        ];
        finish("subjective", lines)
    }

    /// Stage 2: what objectively happens today, given the look-ahead plan
    pub fn objective(
        &self,
        cognition: &str,
        memory: &str,
        subjective: &str,
        plan: &DetailedPlanView,
        date: &str,
        persona: &Value,
    ) -> String {
        let lines = vec![
            "根据人物设定、主观想法和日程安排，按时间顺序写出今天实际发生的事情。".to_string(),
            section("人物设定", &render_value(persona)),
            section("自我认知", cognition),
            section("记忆", memory),
            section("主观想法", subjective),
            section("日程（含前一天与未来五天）", &to_json(plan)),
            section("日期", date),
            "要求：每件事写明大致时间段和地点类型，与未来几天的安排保持连贯。".to_string(),
        ];
        finish("objective", lines)
    }

    /// Route planner, first round: candidate places for the day's narrative
    pub fn route_candidates(&self, persona: &Value, narrative: &str) -> String {
        let lines = vec![
            "为下面这一天的经历挑选具体的地点（店名、场所、街道），并说明出行方式。".to_string(),
            section("人物设定", &render_value(persona)),
            section("当天经历", narrative),
            "要求：按时间顺序列出地点，每行一个。".to_string(),
        ];
        finish("route_candidates", lines)
    }

    /// Route planner, second round: a coherent route over the chosen places
    pub fn route_refine(&self, persona: &Value, narrative: &str, candidates: &str) -> String {
        let lines = vec![
            "检查这些地点是否合理、路线是否顺路，修正后给出完整的路线与地点说明。".to_string(),
            section("人物设定", &render_value(persona)),
            section("当天经历", narrative),
            section("候选地点", candidates),
        ];
        finish("route_refine", lines)
    }

    /// Stage 3: rewrite the day so it follows the resolved route
    pub fn route(&self, objective: &str, poi: &str, date: &str) -> String {
        let lines = vec![
            "结合地点与路线信息，改写当天经历，使时间、地点和交通方式互相吻合。".to_string(),
            section("当天经历", objective),
            section("地点与路线", poi),
            section("日期", date),
        ];
        finish("route", lines)
    }

    /// Stage 4: sensory and social detail
    pub fn detail(&self, short_memory: &str, routed: &str, cognition: &str, poi: &str) -> String {
        let lines = vec![
            "为当天经历补充细节：对话、感受、天气、花费与遇到的人。".to_string(),
            section("近期记忆", short_memory),
            section("当天经历", routed),
            section("自我认知", cognition),
            section("地点与路线", poi),
        ];
        finish("detail", lines)
    }

    /// Stage 5: structured events, JSON only
    pub fn extraction(&self, detailed: &str, places: &str, date: &str) -> String {
        let lines = vec![
            "把当天经历拆分为事件列表，只输出 JSON 数组，不要输出其他文字。".to_string(),
            section("当天经历", detailed),
            section("地点信息", places),
            section("日期", date),
            concat!(
                "格式：[{\"name\": \"事件名\", \"date\": [\"YYYY-MM-DD\"], ",
                "\"description\": \"时间、地点、经过\", \"subevent\": []}]"
            )
            .to_string(),
        ];
        finish("extraction", lines)
    }

    /// Stage 6: end-of-day reflection, JSON with the updated thought
    pub fn reflection(
        &self,
        cognition: &str,
        memory: &str,
        detailed: &str,
        plan: &PlanView,
        date: &str,
    ) -> String {
        let lines = vec![
            "以第一人称回顾今天，反思计划与实际的差别，并更新对接下来几天的想法。".to_string(),
            section("自我认知", cognition),
            section("记忆", memory),
            section("今天的经历", detailed),
            section("计划", &to_json(plan)),
            section("日期", date),
            "只输出 JSON：{\"reflection\": \"反思\", \"thought\": \"新的想法\", \"cognition\": \"（可选）更新后的自我认知\"}".to_string(),
        ];
        finish("reflection", lines)
    }

    /// Stage 7: fold today into the long-term memory, JSON output
    #[allow(clippy::too_many_arguments)]
    pub fn long_memory(
        &self,
        cognition: &str,
        long_memory: &str,
        plan: &PlanView,
        history: &Value,
        raw_events: &str,
        thought: &str,
        date: &str,
    ) -> String {
        let lines = vec![
            "更新长期记忆：保留重要的人、事、习惯与变化，删除琐碎细节。".to_string(),
            section("自我认知", cognition),
            section("原长期记忆", long_memory),
            section("计划", &to_json(plan)),
            section("近几天的记录", &render_value(history)),
            section("今天的事件", raw_events),
            section("当前想法", thought),
            section("日期", date),
            "只输出 JSON：{\"long_memory\": \"更新后的长期记忆\"}".to_string(),
        ];
        finish("long_memory", lines)
    }
}

fn section(title: &str, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("## {}\n（无）", title)
    } else {
        format!("## {}\n{}", title, body)
    }
}

fn finish(stage: &str, lines: Vec<String>) -> String {
    let prompt = lines.join("\n\n");
    debug!("Rendered {} prompt ({} chars)", stage, prompt.chars().count());
    prompt
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Strings render bare, everything else as pretty JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => to_json(other),
    }
}
