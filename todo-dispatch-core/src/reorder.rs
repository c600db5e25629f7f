//! Reorder engine
//!
//! Two ways to move an item: a swap with an adjacent neighbour, animated and
//! committed after one transition delay, and a drag-drop reposition, which is
//! committed at once. Swaps are serialised through a single writer gate, so
//! two overlapping swaps never interleave their glide and commit steps.
//! Positions are always re-resolved by key at commit time.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::context::WidgetContext;
use crate::drag::DragSession;
use crate::event::Direction;
use crate::store::MoveOutcome;
use crate::transition::flash;
use crate::view::VisualClass;

#[derive(Clone, Debug)]
pub struct ReorderEngine {
    ctx: WidgetContext,
    writer: Arc<AsyncMutex<()>>,
}

impl ReorderEngine {
    pub fn new(ctx: WidgetContext) -> Self {
        Self {
            ctx,
            writer: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Swap `key` with its neighbour in `direction`
    ///
    /// At either end of the list, or for an unknown key, nothing happens: no
    /// glide, no notification. Otherwise both nodes glide for one transition
    /// delay, then the transposition is committed and announced.
    pub async fn swap(&self, key: &str, direction: Direction) -> MoveOutcome {
        let _writer = self.writer.lock().await;
        let store = &self.ctx.store;

        let Some(item) = store.controller(key) else {
            debug!(key, "swap of unknown todo ignored");
            return MoveOutcome::Stale;
        };
        let Some(partner_key) = store.swap_partner(key, direction) else {
            debug!(key, direction = direction.label(), "swap at boundary");
            return MoveOutcome::Boundary;
        };

        let glides: Vec<_> = [
            item.node().map(|n| (n, VisualClass::glide(direction))),
            store
                .controller(&partner_key)
                .and_then(|p| p.node())
                .map(|n| (n, VisualClass::glide(direction.opposite()))),
        ]
        .into_iter()
        .flatten()
        .collect();
        flash(self.ctx.view.as_ref(), &glides, self.ctx.delay()).await;

        // The item may have been renamed or removed during the glide
        if !item.is_live() {
            debug!(key, "todo removed while gliding");
            return MoveOutcome::Stale;
        }
        let key = item.key();
        let outcome = store.move_by_swap(&key, direction);
        if outcome.is_moved() {
            self.ctx
                .toast(format!("moving todo {key} {}", direction.label()));
        }
        outcome
    }

    /// Reposition `dragged` immediately before `target`
    ///
    /// Self-drops and unknown keys change nothing and stay silent.
    pub fn drop_before(&self, dragged: &str, target: &str) -> MoveOutcome {
        let outcome = self.ctx.store.move_before(dragged, target);
        if outcome.is_moved() {
            self.ctx
                .toast(format!("moving todo {dragged} to before {target}"));
        }
        outcome
    }

    /// Finish the drag in `session` by dropping it on `target`
    ///
    /// Clears the target's drag feedback whether or not a drag was running.
    pub fn drop_on(&self, session: &DragSession, target: &str) -> MoveOutcome {
        if let Some(item) = self.ctx.store.controller(target) {
            item.drag_leave();
        }
        match session.take() {
            Some(payload) => self.drop_before(&payload.key, target),
            None => MoveOutcome::Stale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TodoEvent;
    use crate::testing::WidgetHarness;
    use std::time::Duration;

    fn harness_with(keys: &[&str], animated: bool) -> WidgetHarness {
        let harness = if animated {
            WidgetHarness::animated()
        } else {
            WidgetHarness::instant()
        };
        for key in keys {
            harness.widget.add(key).unwrap();
        }
        harness.recorder.clear();
        harness
    }

    #[tokio::test]
    async fn test_swap_up_then_down_restores_order() {
        let harness = harness_with(&["a", "b", "c"], false);
        let widget = &harness.widget;

        assert_eq!(
            widget.move_item("c", Direction::Up).await,
            MoveOutcome::Moved { from: 2, to: 1 }
        );
        assert_eq!(widget.keys(), vec!["a", "c", "b"]);

        widget.move_item("c", Direction::Down).await;
        assert_eq!(widget.keys(), vec!["a", "b", "c"]);
        assert_eq!(
            harness.recorder.toasts(),
            vec!["moving todo c up", "moving todo c down"]
        );
    }

    #[tokio::test]
    async fn test_swap_at_boundary_is_silent() {
        let harness = harness_with(&["a", "b"], false);

        assert_eq!(
            harness.widget.move_item("a", Direction::Up).await,
            MoveOutcome::Boundary
        );
        assert_eq!(
            harness.widget.move_item("b", Direction::Down).await,
            MoveOutcome::Boundary
        );
        assert_eq!(
            harness.widget.move_item("zz", Direction::Down).await,
            MoveOutcome::Stale
        );
        assert_eq!(harness.widget.keys(), vec!["a", "b"]);
        assert!(harness.recorder.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_glides_both_nodes() {
        let harness = harness_with(&["a", "b"], true);
        harness.settle().await;
        let a = harness.widget.controller("a").unwrap().node().unwrap();
        let b = harness.widget.controller("b").unwrap().node().unwrap();

        let engine = harness.widget.reorder().clone();
        let swap = tokio::spawn(async move { engine.swap("b", Direction::Up).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(harness.view.classes(b), VisualClass::MOVE_UP);
        assert_eq!(harness.view.classes(a), VisualClass::MOVE_DOWN);
        assert_eq!(harness.widget.keys(), vec!["a", "b"]);

        assert!(swap.await.unwrap().is_moved());
        assert_eq!(harness.widget.keys(), vec!["b", "a"]);
        assert_eq!(harness.view.classes(a), VisualClass::empty());
        assert_eq!(harness.view.classes(b), VisualClass::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_swaps_are_serialised() {
        let harness = harness_with(&["a", "b", "c"], true);
        harness.settle().await;

        let first = harness.widget.reorder().clone();
        let second = harness.widget.reorder().clone();
        let one = tokio::spawn(async move { first.swap("c", Direction::Up).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let two = tokio::spawn(async move { second.swap("c", Direction::Up).await });

        assert_eq!(one.await.unwrap(), MoveOutcome::Moved { from: 2, to: 1 });
        assert_eq!(two.await.unwrap(), MoveOutcome::Moved { from: 1, to: 0 });
        assert_eq!(harness.widget.keys(), vec!["c", "a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_removed_mid_glide_is_not_moved() {
        let harness = harness_with(&["a", "b"], true);
        harness.settle().await;

        let engine = harness.widget.reorder().clone();
        let swap = tokio::spawn(async move { engine.swap("b", Direction::Up).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.widget.remove("b");

        assert_eq!(swap.await.unwrap(), MoveOutcome::Stale);
        assert_eq!(harness.widget.keys(), vec!["a"]);
        assert_eq!(
            harness
                .recorder
                .toasts()
                .iter()
                .filter(|t| t.starts_with("moving"))
                .count(),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_reused_mid_glide_is_not_moved() {
        let harness = harness_with(&["a", "b"], true);
        harness.settle().await;
        let old_b = harness.widget.controller("b").unwrap().id();

        let engine = harness.widget.reorder().clone();
        let swap = tokio::spawn(async move { engine.swap("b", Direction::Up).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.widget.remove("b");
        let new_b = harness.widget.add("b").unwrap();
        assert_ne!(new_b.id(), old_b);

        assert_eq!(swap.await.unwrap(), MoveOutcome::Stale);
        assert_eq!(harness.widget.keys(), vec!["a", "b"]);
        crate::assert_not_emitted!(
            harness.recorder.events(),
            TodoEvent::Toast(text) if text.starts_with("moving")
        );
    }

    #[test]
    fn test_drop_before() {
        let harness = harness_with(&["a", "b", "c"], false);

        assert!(harness.widget.drop_before("c", "a").is_moved());
        assert_eq!(harness.widget.keys(), vec!["c", "a", "b"]);
        assert_eq!(harness.recorder.toasts(), vec!["moving todo c to before a"]);

        assert_eq!(harness.widget.drop_before("a", "a"), MoveOutcome::Unchanged);
        assert_eq!(harness.widget.drop_before("x", "a"), MoveOutcome::Stale);
        assert_eq!(harness.recorder.toasts().len(), 1);
    }

    #[test]
    fn test_drop_on_uses_session_payload() {
        let harness = harness_with(&["a", "b", "c"], false);
        let widget = &harness.widget;

        widget.drag_start("a");
        widget.drag_enter("c");
        let target = widget.controller("c").unwrap().node().unwrap();
        assert_eq!(harness.view.classes(target), VisualClass::DRAG_TARGET);

        assert!(widget.drop_on("c").is_moved());
        assert_eq!(widget.keys(), vec!["b", "a", "c"]);
        assert_eq!(harness.view.classes(target), VisualClass::empty());

        // Payload was consumed
        assert_eq!(widget.drop_on("b"), MoveOutcome::Stale);
    }
}
