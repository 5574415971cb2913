//! JavaScript evaluated inside every fresh context before the user script.
//!
//! Installs the console shim, timers, the statement mark hook and the settle
//! hook the wrapper calls. Messages go out as JSON through the native
//! `__jsbox_post` binding, which is captured here and then removed from the
//! global object.
//!
//! The prelude evaluates to the timer `tick` function. The worker calls it in
//! a loop: each call fires at most one due timer and returns `0`, returns the
//! milliseconds until the next timer is due, or `-1` once the invocation has
//! settled or nothing is left to run.

/// Name of the native binding registered by the worker.
pub const POST_FN: &str = "__jsbox_post";

/// Global the instrumented script calls before each top-level statement.
pub const MARK_FN: &str = "__jsbox_mark";

pub const PRELUDE: &str = r#"(function (post) {
  "use strict";

  const now = Date.now;

  const coerce = (value) => {
    try {
      return String(value);
    } catch (_) {
      return Object.prototype.toString.call(value);
    }
  };

  const format = (args) =>
    args
      .map((arg) => {
        if (typeof arg === "string") return arg;
        try {
          const json = JSON.stringify(arg);
          return json === undefined ? coerce(arg) : json;
        } catch (_) {
          return coerce(arg);
        }
      })
      .join(" ");

  const console = {};
  ["log", "info", "warn", "error"].forEach((level) => {
    console[level] = (...args) => {
      post(JSON.stringify({ type: "log", level: level, text: format(args) }));
    };
  });
  globalThis.console = console;

  let mark;
  Object.defineProperty(globalThis, "__jsbox_mark", {
    value: (line, column) => {
      mark = { line: line, column: column };
    },
    writable: false,
    enumerable: false,
    configurable: false,
  });

  let settled = false;

  const done = (value) => {
    if (settled) return;
    settled = true;
    let message;
    try {
      const json = JSON.stringify(value);
      message = json === undefined ? { type: "done" } : { type: "done", json: json };
    } catch (_) {
      message = { type: "done", text: coerce(value) };
    }
    post(JSON.stringify(message));
  };

  const fail = (err, at) => {
    if (settled) return;
    settled = true;
    const hasProps = err !== null && err !== undefined;
    const message =
      hasProps && err.message !== undefined ? coerce(err.message) : coerce(err);
    let stack = hasProps && err.stack ? coerce(err.stack) : undefined;
    if (stack === undefined && at !== undefined) {
      const head =
        hasProps && err.name !== undefined ? coerce(err.name) + ": " + message : message;
      stack = head + "\n    at <anonymous>:" + at.line + ":" + at.column;
    }
    post(JSON.stringify({ type: "error", message: message, stack: stack }));
  };

  const timers = new Map();
  let nextTimer = 1;
  let order = 0;

  const schedule = (callback, delay, args, repeat) => {
    if (typeof callback !== "function") {
      throw new TypeError("timer callback must be a function");
    }
    const id = nextTimer++;
    const ms = Math.max(0, Number(delay) || 0);
    timers.set(id, {
      id: id,
      callback: callback,
      args: args,
      ms: ms,
      repeat: repeat,
      due: now() + ms,
      order: order++,
      at: mark,
    });
    return id;
  };

  const clear = (id) => {
    timers.delete(id);
  };

  globalThis.setTimeout = (callback, delay, ...args) => schedule(callback, delay, args, false);
  globalThis.setInterval = (callback, delay, ...args) => schedule(callback, delay, args, true);
  globalThis.clearTimeout = clear;
  globalThis.clearInterval = clear;

  const tick = () => {
    if (settled) return -1;
    let next;
    for (const timer of timers.values()) {
      if (
        next === undefined ||
        timer.due < next.due ||
        (timer.due === next.due && timer.order < next.order)
      ) {
        next = timer;
      }
    }
    if (next === undefined) return -1;
    const wait = next.due - now();
    if (wait > 0) return wait;
    if (next.repeat) {
      next.due += Math.max(next.ms, 1);
      next.order = order++;
    } else {
      timers.delete(next.id);
    }
    try {
      next.callback(...next.args);
    } catch (err) {
      fail(err, next.at);
    }
    return 0;
  };

  globalThis.__jsbox_settle = (pending) => {
    Promise.resolve(pending).then(done, (err) => fail(err, mark));
  };

  try {
    delete globalThis.__jsbox_post;
  } catch (_) {
    try {
      globalThis.__jsbox_post = undefined;
    } catch (_) {}
  }

  return tick;
})(__jsbox_post);
"#;
