//! Answer composition.
//!
//! Merges the system prompt, the numbered statute passages, and the
//! conversation so far into one completion request, and returns the
//! generated answer next to the source list built from the same
//! numbering. The assistant is a long-lived service object holding the
//! retriever, completion client, and history provider; it is constructed
//! once at startup and injected into callers.

use std::sync::Arc;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::cite::{format_citations, SourceRecord};
use crate::completion::{CompletionClient, PromptMessage};
use crate::config::ChatConfig;
use crate::history::{HistoryProvider, Role, Turn};
use crate::retrieve::Retriever;

/// Response shape consumed by the HTTP layer.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRecord>,
    pub session_id: String,
}

/// The ask-path service: retrieval, citation formatting, prompt
/// composition, completion.
pub struct Assistant {
    retriever: Arc<Retriever>,
    completion: Arc<dyn CompletionClient>,
    history: Arc<dyn HistoryProvider>,
    history_limit: usize,
}

impl Assistant {
    pub fn new(
        retriever: Arc<Retriever>,
        completion: Arc<dyn CompletionClient>,
        history: Arc<dyn HistoryProvider>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            retriever,
            completion,
            history,
            history_limit: config.history_limit,
        }
    }

    /// Answer a question with numbered citations.
    ///
    /// A missing session id is replaced with a fresh UUID. The caller is
    /// expected to have persisted the user's message already; the most
    /// recent history entry is therefore not repeated when it matches
    /// the question verbatim.
    pub async fn ask(&self, question: &str, session_id: Option<&str>) -> Result<AskResponse> {
        let session_id = match session_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                info!(session_id = %id, "generated new session id");
                id
            }
        };

        let matches = self.retriever.top_matches(question).await?;
        let formatted = format_citations(&matches);
        info!(
            session_id = %session_id,
            matches = matches.len(),
            sources = formatted.sources.len(),
            "retrieval complete"
        );

        let turns = self
            .history
            .history(&session_id, self.history_limit)
            .await?;

        let system = build_system_prompt(&formatted.context, formatted.sources.len());
        let user = build_user_prompt(&turns, question);

        let answer = self
            .completion
            .complete(&[PromptMessage::system(system), PromptMessage::user(user)])
            .await?;
        let answer = answer.trim().to_string();

        // Best effort: anchors outside 1..N are surfaced to operators
        // but the answer is returned unmodified.
        for anchor in anchor_numbers(&answer) {
            if anchor == 0 || anchor > formatted.sources.len() {
                warn!(
                    session_id = %session_id,
                    anchor,
                    sources = formatted.sources.len(),
                    "answer cites an out-of-range source"
                );
            }
        }

        Ok(AskResponse {
            answer,
            sources: formatted.sources,
            session_id,
        })
    }
}

/// System prompt: counseling persona plus grounding rules over the
/// numbered passages.
fn build_system_prompt(context: &str, source_count: usize) -> String {
    let mut prompt = String::from(
        "당신은 '전세사기피해 상담 챗봇'입니다.\n\
         사용자가 전세사기 피해/예방/신고/법적 절차 등을 질문하면, 한국 상황을 기준으로\n\
         정확하고 단계적으로 안내하되, 단정적인 법률 판단은 피하고 '가능한 절차/기관/준비서류' 중심으로 설명하라.\n\
         답변은 읽기 쉬운 번호 목록 형태를 선호한다.\n\
         \n\
         아래에 번호가 붙은 법령 발췌문이 제공된다. 반드시 다음 규칙을 지켜라.\n\
         - 모든 주장과 절차 안내는 제공된 발췌문에 근거해야 한다.\n\
         - 근거가 된 발췌문의 번호를 【n】 형태로 문장 끝에 표기하라. 일반 괄호나 [n]은 사용하지 않는다.\n",
    );
    if source_count > 0 {
        prompt.push_str(&format!(
            "- 번호는 1부터 {}까지만 존재한다. 없는 번호를 만들어 내지 마라.\n",
            source_count
        ));
    }
    prompt.push_str(
        "- 발췌문만으로 답하기 어려우면 추측하지 말고 근거가 부족하다고 명시하라.\n\n[법령 발췌문]\n",
    );
    if source_count == 0 {
        prompt.push_str("(제공된 발췌문 없음)");
    } else {
        prompt.push_str(context);
    }
    prompt
}

/// Flat "conversation so far" block prepended to the current question.
/// When the most recent entry is a user message identical to the
/// question, it is dropped — the caller stored the question before
/// invoking us.
fn build_user_prompt(turns: &[Turn], question: &str) -> String {
    let mut turns = turns;
    if let Some(last) = turns.last() {
        if last.role == Role::User && last.content == question {
            turns = &turns[..turns.len() - 1];
        }
    }

    if turns.is_empty() {
        return question.to_string();
    }

    let mut out = String::from("[지금까지의 대화]\n");
    for turn in turns {
        out.push_str(turn.role.as_str());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out.push_str("\n[현재 질문]\n");
    out.push_str(question);
    out
}

/// Citation-anchor numbers (`【n】`) appearing in generated text.
pub fn anchor_numbers(text: &str) -> Vec<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"【\s*(\d+)\s*】").unwrap());
    re.captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}
