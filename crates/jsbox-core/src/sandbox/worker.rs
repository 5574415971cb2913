//! Worker side of the isolated context.
//!
//! A worker serves exactly one [`WorkerRequest`]: it builds a fresh
//! `boa_engine` context with no file system or network, installs the prelude,
//! marks the script's statements, evaluates it, then alternates between the
//! job queue and due timers until the script settles or nothing is pending.
//! Messages are written to the outbox as they are posted, so the host sees
//! logs from code that later loops forever.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::time::Duration;

use boa_engine::{Context, JsError, JsObject, JsResult, JsString, JsValue, NativeFunction, Source};

use super::error::{SandboxError, SandboxResult};
use super::instrument::instrument;
use super::outcome::InvocationId;
use super::prelude::{POST_FN, PRELUDE};
use super::protocol::{Envelope, WorkerMessage, WorkerRequest};

struct Outbox {
    id: InvocationId,
    sink: Box<dyn Write>,
}

impl Outbox {
    fn send(&mut self, message: WorkerMessage) {
        let envelope = Envelope {
            id: self.id,
            message,
        };
        let line = match envelope.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode worker message");
                return;
            }
        };
        if let Err(e) = writeln!(self.sink, "{line}").and_then(|_| self.sink.flush()) {
            tracing::warn!(error = %e, "failed to write worker message");
        }
    }
}

thread_local! {
    // Native bindings are plain fn pointers, so the outbound channel lives here.
    static OUTBOX: RefCell<Option<Outbox>> = const { RefCell::new(None) };
}

fn send(message: WorkerMessage) {
    OUTBOX.with(|outbox| {
        if let Some(outbox) = outbox.borrow_mut().as_mut() {
            outbox.send(message);
        }
    });
}

fn post(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let raw = match args.first() {
        Some(value) => value.to_string(context)?.to_std_string_escaped(),
        None => return Ok(JsValue::undefined()),
    };
    match serde_json::from_str::<WorkerMessage>(&raw) {
        Ok(message) => send(message),
        Err(e) => tracing::warn!(error = %e, "discarding malformed message from context"),
    }
    Ok(JsValue::undefined())
}

/// Split an engine error's display text into `(message, trace)`.
///
/// Native errors display as `Kind: message`; the message drops the kind the
/// same way `err.message` would, and the full text is kept as the trace.
pub(crate) fn split_error_display(display: &str) -> (String, Option<String>) {
    match display.split_once(": ") {
        Some((kind, message)) if kind.ends_with("Error") && !kind.contains(char::is_whitespace) => {
            (message.to_string(), Some(display.to_string()))
        }
        _ => (display.to_string(), Some(display.to_string())),
    }
}

fn report_engine_error(err: &JsError) {
    let (message, stack) = split_error_display(&err.to_string());
    send(WorkerMessage::Error { message, stack });
}

fn engine_error(err: JsError) -> SandboxError {
    SandboxError::Engine(err.to_string())
}

fn evaluate(script: &str) -> SandboxResult<()> {
    let mut context = Context::default();
    context
        .register_global_callable(JsString::from(POST_FN), 1, NativeFunction::from_fn_ptr(post))
        .map_err(engine_error)?;

    let tick = context
        .eval(Source::from_bytes(PRELUDE))
        .map_err(engine_error)?
        .as_callable()
        .cloned()
        .ok_or_else(|| SandboxError::Engine("prelude did not return the timer tick".into()))?;

    let script = instrument(script, &mut context);
    if let Err(err) = context.eval(Source::from_bytes(&script)) {
        report_engine_error(&err);
        return Ok(());
    }

    context.run_jobs();
    drive_timers(&tick, &mut context)
}

/// Fire due timers, draining the job queue after each, until `tick` reports
/// the script settled or no timer is left. Endless intervals are ended by the
/// host's deadline.
fn drive_timers(tick: &JsObject, context: &mut Context) -> SandboxResult<()> {
    loop {
        let wait = tick
            .call(&JsValue::undefined(), &[], context)
            .map_err(engine_error)?
            .as_number()
            .unwrap_or(-1.0);
        if wait.is_nan() || wait < 0.0 {
            return Ok(());
        }
        if wait > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(wait / 1000.0));
        }
        context.run_jobs();
    }
}

/// Serve one request, writing envelopes to `sink`.
pub fn run_request(request: &WorkerRequest, sink: Box<dyn Write>) -> SandboxResult<()> {
    OUTBOX.with(|outbox| {
        *outbox.borrow_mut() = Some(Outbox {
            id: request.id,
            sink,
        });
    });
    let result = evaluate(&request.script);
    OUTBOX.with(|outbox| outbox.borrow_mut().take());
    result
}

/// Entry point for the worker binary: request on stdin, envelopes on stdout.
pub fn serve_stdio() -> SandboxResult<()> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;
    let request: WorkerRequest =
        serde_json::from_str(&raw).map_err(|e| SandboxError::Protocol(e.to_string()))?;
    tracing::debug!(invocation_id = %request.id, "worker serving request");
    run_request(&request, Box::new(std::io::stdout()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::LogLevel;
    use crate::transform::TransformedSource;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run(code: &str) -> Vec<WorkerMessage> {
        let buf = SharedBuf::default();
        let request = WorkerRequest {
            id: InvocationId::new(11),
            script: TransformedSource::new(code).script().to_string(),
        };
        run_request(&request, Box::new(buf.clone())).unwrap();
        let bytes = buf.0.borrow().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| {
                let env = Envelope::from_line(line).unwrap();
                assert_eq!(env.id, InvocationId::new(11));
                env.message
            })
            .collect()
    }

    #[test]
    fn test_expression_result() {
        assert_eq!(
            run("1 + 1"),
            vec![WorkerMessage::Done {
                json: Some("2".into()),
                text: None
            }]
        );
    }

    #[test]
    fn test_logs_precede_done() {
        let messages = run("console.log('a');\nconsole.warn('b', {n: 1});\n1");
        assert_eq!(
            messages[0],
            WorkerMessage::Log {
                level: LogLevel::Log,
                text: "a".into()
            }
        );
        assert_eq!(
            messages[1],
            WorkerMessage::Log {
                level: LogLevel::Warn,
                text: "b {\"n\":1}".into()
            }
        );
        assert!(matches!(&messages[2], WorkerMessage::Done { json: Some(j), .. } if j == "1"));
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn test_thrown_error_is_reported() {
        let messages = run("const f = () => {\n  throw new TypeError('bad input');\n};\nf()");
        match &messages[..] {
            [WorkerMessage::Error { message, .. }] => assert_eq!(message, "bad input"),
            other => panic!("expected one error, got {other:?}"),
        }
    }

    #[test]
    fn test_runtime_error_carries_last_statement_mark() {
        let messages = run("const a = 1;\nnull.x;");
        match &messages[..] {
            [WorkerMessage::Error {
                stack: Some(stack), ..
            }] => assert!(stack.ends_with("\n    at <anonymous>:5:1"), "{stack}"),
            other => panic!("expected one error, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_callback_settles_awaited_promise() {
        let messages = run("await new Promise((r) => setTimeout(r, 10));\n1");
        assert!(matches!(&messages[..], [WorkerMessage::Done { json: Some(j), .. }] if j == "1"));
    }

    #[test]
    fn test_timers_fire_in_due_order_with_arguments() {
        let code = "const out = [];\nsetTimeout((v) => out.push(v), 20, 'b');\nsetTimeout((v) => out.push(v), 5, 'a');\nawait new Promise((r) => setTimeout(r, 40));\nout.join('')";
        let messages = run(code);
        assert!(
            matches!(&messages[..], [WorkerMessage::Done { json: Some(j), .. }] if j == "\"ab\""),
            "{messages:?}"
        );
    }

    #[test]
    fn test_cleared_timers_never_fire() {
        let code = "let n = 0;\nconst t = setTimeout(() => { n = 99; }, 5);\nclearTimeout(t);\nawait new Promise((r) => {\n  const i = setInterval(() => {\n    if (++n === 3) {\n      clearInterval(i);\n      r();\n    }\n  }, 5);\n});\nawait new Promise((r) => setTimeout(r, 20));\nn";
        let messages = run(code);
        assert!(matches!(&messages[..], [WorkerMessage::Done { json: Some(j), .. }] if j == "3"));
    }

    #[test]
    fn test_throwing_timer_callback_fails_at_its_scheduling_line() {
        let messages = run("const a = 1;\nsetTimeout(() => a.b.c, 0);\nawait new Promise(() => {});");
        match &messages[..] {
            [WorkerMessage::Error {
                stack: Some(stack), ..
            }] => assert!(stack.ends_with("<anonymous>:5:1"), "{stack}"),
            other => panic!("expected one error, got {other:?}"),
        }
    }

    #[test]
    fn test_pending_timers_do_not_outlive_the_result() {
        let messages = run("setTimeout(() => console.log('late'), 10);\n1");
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], WorkerMessage::Done { .. }));
    }

    #[test]
    fn test_syntax_error_is_reported_from_eval() {
        let messages = run("const = ;");
        assert!(matches!(&messages[..], [WorkerMessage::Error { stack: Some(_), .. }]));
    }

    #[test]
    fn test_undefined_result_has_no_json() {
        assert_eq!(
            run("undefined"),
            vec![WorkerMessage::Done {
                json: None,
                text: None
            }]
        );
    }

    #[test]
    fn test_awaited_value_resolves() {
        let messages = run("const v = await Promise.resolve(5);\nv * 2");
        assert!(matches!(&messages[..], [WorkerMessage::Done { json: Some(j), .. }] if j == "10"));
    }

    #[test]
    fn test_post_binding_is_hidden_from_user_code() {
        let messages = run("typeof __jsbox_post");
        assert!(
            matches!(&messages[..], [WorkerMessage::Done { json: Some(j), .. }] if j == "\"undefined\"")
        );
    }

    #[test]
    fn test_split_error_display() {
        assert_eq!(
            split_error_display("ReferenceError: foo is not defined"),
            (
                "foo is not defined".to_string(),
                Some("ReferenceError: foo is not defined".to_string())
            )
        );
        let (message, _) = split_error_display("uncaught: 5");
        assert_eq!(message, "uncaught: 5");
    }
}
