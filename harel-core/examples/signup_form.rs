//! An invoked actor on a tokio-hosted machine: submitting the form runs an
//! async "API call" whose outcome routes through `on_done` / `on_error`.
//!
//! Run with: `cargo run --example signup_form`

use std::sync::Arc;
use std::time::Duration;

use harel_core::prelude::*;

#[derive(Debug, Clone, PartialEq, Default)]
struct FormContext {
    email: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq)]
enum FormEvent {
    Submit,
    UpdateField { field: &'static str, value: String },
    Retry,
    Reset,
}

impl Event for FormEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FormEvent::Submit => "SUBMIT",
            FormEvent::UpdateField { .. } => "UPDATE_FIELD",
            FormEvent::Retry => "RETRY",
            FormEvent::Reset => "RESET",
        }
    }
}

struct Form;

impl MachineTypes for Form {
    type Context = FormContext;
    type Event = FormEvent;
    type Output = String;
}

fn build() -> Result<MachineDef, DefinitionError> {
    let mut builder = MachineBuilder::new("signupForm");
    let root = builder.root();
    let editing = builder.state(root, "editing");
    let submitting = builder.state(root, "submitting");
    let success = builder.state(root, "success");
    let error = builder.state(root, "error");
    builder.initial(root, editing);

    builder.on(editing, "SUBMIT").target(submitting);
    builder.on(editing, "UPDATE_FIELD").action("updateField");
    builder.on(editing, "RESET").target(editing).action("clear");

    builder.invoke(submitting, "submitForm");
    builder.on_done(submitting).target(success);
    builder.on_error(submitting).target(error);

    builder.on(success, "RESET").target(editing).action("clear");
    builder.on(error, "RETRY").target(editing);
    builder.on(error, "RESET").target(editing).action("clear");

    builder.build()
}

fn registry() -> Registry<Form> {
    Registry::new()
        .action("updateField", |args: &mut ActionArgs<'_, Form>| {
            if let Some(FormEvent::UpdateField { field, value }) = args.cause.event() {
                match *field {
                    "email" => args.context.email = value.clone(),
                    "password" => args.context.password = value.clone(),
                    other => tracing::warn!(field = other, "unknown form field"),
                }
            }
        })
        .action("clear", |args: &mut ActionArgs<'_, Form>| {
            *args.context = FormContext::default();
        })
        .actor("submitForm", |ctx: &FormContext| {
            let form = ctx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if form.email.is_empty() {
                    Err(ActorFailure::new("email is required"))
                } else {
                    Ok(format!("registered {}", form.email))
                }
            }
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let def = Arc::new(build()?);
    let handle = spawn_machine(def, registry(), FormContext::default())?;

    // Submitting an empty form fails.
    handle.send(FormEvent::Submit)?;
    let failed = handle
        .wait_for(|s| s.value.leaf() == Some("error"))
        .await?;
    println!("submit failed: {:?}", failed.error);

    // Fix the form and retry.
    handle.send(FormEvent::Retry)?;
    handle.send(FormEvent::UpdateField {
        field: "email",
        value: "ada@example.com".into(),
    })?;
    handle.send(FormEvent::UpdateField {
        field: "password",
        value: "hunter2".into(),
    })?;
    handle.send(FormEvent::Submit)?;
    let done = handle
        .wait_for(|s| s.value.leaf() == Some("success"))
        .await?;
    println!("submitted as {}", done.context.email);

    handle.stop();
    Ok(())
}
