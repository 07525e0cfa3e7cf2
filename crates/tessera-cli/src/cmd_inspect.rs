use std::fmt::Write as _;
use std::path::Path;

use serde_json::json;
use tessera_core::{Context, StopReason};
use tessera_session::{LoadedSession, SessionStep};
use time::format_description::well_known::Rfc3339;

pub fn execute(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let session = crate::load_session(root, file)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&session))?);
    } else {
        print!("{}", render(&session));
    }
    Ok(())
}

fn saved_at(session: &LoadedSession) -> Option<String> {
    session.saved_at.and_then(|t| t.format(&Rfc3339).ok())
}

pub(crate) fn stop_reason_str(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Success => "success",
        StopReason::Interrupted => "interrupted",
        StopReason::Error => "error",
    }
}

fn context_counts(ctx: &Context) -> String {
    format!(
        "editable {}, read-only {}, virtual {}, history {}",
        ctx.editable_files().len(),
        ctx.readonly_files().len(),
        ctx.virtual_fragments().len(),
        ctx.task_history().len()
    )
}

fn render(session: &LoadedSession) -> String {
    let history = &session.history;
    let mut out = String::new();
    let _ = write!(out, "Session {}", session.session_id);
    match saved_at(session) {
        Some(t) => {
            let _ = write!(out, " (saved {t})");
        }
        None if session.migrated => out.push_str(" (migrated from legacy format)"),
        None => {}
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "Steps: {}  Contexts: {}",
        history.len(),
        history.flatten_contexts().len()
    );

    for (i, step) in history.steps().iter().enumerate() {
        out.push('\n');
        let _ = writeln!(out, "#{} {}", i + 1, step_header(step));
        for ctx in step.contexts() {
            let _ = writeln!(out, "   {}  {}  ({})", ctx.id(), ctx.action(), context_counts(ctx));
        }
    }
    out
}

fn step_header(step: &SessionStep) -> String {
    match step.event() {
        None => format!("manual  \"{}\"", step.description()),
        Some(event) => format!(
            "task    \"{}\"  (from {}, {} messages, {})",
            event.result.action_description,
            event.before_context,
            event.result.messages.len(),
            stop_reason_str(event.result.stop_reason)
        ),
    }
}

fn to_json(session: &LoadedSession) -> serde_json::Value {
    let steps: Vec<serde_json::Value> = session
        .history
        .steps()
        .iter()
        .map(|step| {
            let contexts: Vec<serde_json::Value> = step
                .contexts()
                .iter()
                .map(|ctx| {
                    json!({
                        "id": ctx.id(),
                        "action": ctx.action(),
                        "editable": ctx.editable_files().len(),
                        "readonly": ctx.readonly_files().len(),
                        "virtual": ctx.virtual_fragments().len(),
                        "history": ctx.task_history().len(),
                    })
                })
                .collect();
            let event = step.event().map(|e| {
                json!({
                    "before_context": e.before_context,
                    "action": e.result.action_description,
                    "messages": e.result.messages.len(),
                    "stop_reason": stop_reason_str(e.result.stop_reason),
                })
            });
            json!({ "event": event, "contexts": contexts })
        })
        .collect();
    json!({
        "session_id": session.session_id,
        "saved_at": saved_at(session),
        "migrated": session.migrated,
        "steps": steps,
    })
}
