use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use flowdag::exec::{ActionDriver, ActionError, ActionFuture, ActionResult, ElementHandle};

/// Driver operation, used to script failures and delays per call kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Navigate,
    Find,
    Click,
    Fill,
    Clear,
    ScrollIntoView,
    Text,
    Scroll,
    GoBack,
    CurrentUrl,
    Wait,
}

#[derive(Default)]
struct Script {
    calls: Vec<(Op, String)>,
    fail_next: HashMap<Op, VecDeque<ActionError>>,
    fail_always: HashMap<Op, ActionError>,
    missing: HashSet<String>,
    missing_for: HashMap<String, u32>,
    texts: HashMap<String, String>,
    delays: HashMap<Op, Duration>,
    url: String,
    in_flight: usize,
    max_in_flight: usize,
}

/// A fake driver that:
/// - records every call as a readable line (`"navigate https://a"`)
/// - succeeds by default, with every selector present
/// - fails or delays operations as scripted by the test.
///
/// Scripting methods take `&self`, so a driver already shared through an
/// `Arc` can still be adjusted.
#[derive(Default)]
pub struct ScriptedDriver {
    script: Mutex<Script>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Fail the next call of `op` with `err`. Queued errors are used in order.
    pub fn fail_next(&self, op: Op, err: ActionError) -> &Self {
        self.script().fail_next.entry(op).or_default().push_back(err);
        self
    }

    /// Fail every call of `op` with `err`.
    pub fn fail_always(&self, op: Op, err: ActionError) -> &Self {
        self.script().fail_always.insert(op, err);
        self
    }

    /// `find(selector)` never resolves.
    pub fn missing(&self, selector: &str) -> &Self {
        self.script().missing.insert(selector.to_string());
        self
    }

    /// `find(selector)` resolves only after `misses` unsuccessful lookups.
    pub fn missing_for(&self, selector: &str, misses: u32) -> &Self {
        self.script().missing_for.insert(selector.to_string(), misses);
        self
    }

    pub fn set_text(&self, selector: &str, text: &str) -> &Self {
        self.script()
            .texts
            .insert(selector.to_string(), text.to_string());
        self
    }

    /// Make every call of `op` take `delay` before answering.
    pub fn delay(&self, op: Op, delay: Duration) -> &Self {
        self.script().delays.insert(op, delay);
        self
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.script().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.script().calls.iter().filter(|(o, _)| *o == op).count()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.script().max_in_flight
    }

    /// Calls currently in flight. Cancelled calls are released on drop.
    pub fn in_flight(&self) -> usize {
        self.script().in_flight
    }

    async fn call<T>(
        &self,
        op: Op,
        line: String,
        answer: impl FnOnce(&mut Script) -> ActionResult<T> + Send,
    ) -> ActionResult<T> {
        let (in_flight, delay) = {
            let mut script = self.script();
            script.calls.push((op, line));
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            (InFlight(&self.script), script.delays.get(&op).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        drop(in_flight);

        let mut script = self.script();
        if let Some(err) = script.fail_next.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if let Some(err) = script.fail_always.get(&op) {
            return Err(err.clone());
        }
        answer(&mut script)
    }
}

/// Leaves the in-flight count when dropped, including when the calling
/// future is cancelled mid-delay.
struct InFlight<'a>(&'a Mutex<Script>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut script = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        script.in_flight = script.in_flight.saturating_sub(1);
    }
}

impl ActionDriver for ScriptedDriver {
    fn navigate<'a>(&'a self, url: &'a str) -> ActionFuture<'a, ()> {
        Box::pin(self.call(Op::Navigate, format!("navigate {url}"), move |s| {
            s.url = url.to_string();
            Ok(())
        }))
    }

    fn find<'a>(&'a self, selector: &'a str) -> ActionFuture<'a, Option<ElementHandle>> {
        Box::pin(self.call(Op::Find, format!("find {selector}"), move |s| {
            if s.missing.contains(selector) {
                return Ok(None);
            }
            if let Some(remaining) = s.missing_for.get_mut(selector) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(None);
                }
            }
            Ok(Some(ElementHandle::new(selector)))
        }))
    }

    fn click<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()> {
        Box::pin(self.call(Op::Click, format!("click {}", element.selector), |_| Ok(())))
    }

    fn fill<'a>(&'a self, element: &'a ElementHandle, text: &'a str) -> ActionFuture<'a, ()> {
        Box::pin(self.call(
            Op::Fill,
            format!("fill {}={text}", element.selector),
            |_| Ok(()),
        ))
    }

    fn clear<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()> {
        Box::pin(self.call(Op::Clear, format!("clear {}", element.selector), |_| Ok(())))
    }

    fn scroll_into_view<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()> {
        Box::pin(self.call(
            Op::ScrollIntoView,
            format!("scroll_into_view {}", element.selector),
            |_| Ok(()),
        ))
    }

    fn text<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, String> {
        Box::pin(self.call(Op::Text, format!("text {}", element.selector), move |s| {
            Ok(s.texts.get(&element.selector).cloned().unwrap_or_default())
        }))
    }

    fn scroll(&self, dx: i64, dy: i64) -> ActionFuture<'_, ()> {
        Box::pin(self.call(Op::Scroll, format!("scroll {dx},{dy}"), |_| Ok(())))
    }

    fn go_back(&self) -> ActionFuture<'_, ()> {
        Box::pin(self.call(Op::GoBack, "go_back".to_string(), |_| Ok(())))
    }

    fn current_url(&self) -> ActionFuture<'_, String> {
        Box::pin(self.call(Op::CurrentUrl, "current_url".to_string(), |s| {
            Ok(s.url.clone())
        }))
    }

    fn wait(&self, duration: Duration) -> ActionFuture<'_, ()> {
        Box::pin(async move {
            self.call(Op::Wait, format!("wait {}ms", duration.as_millis()), |_| Ok(()))
                .await?;
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}
