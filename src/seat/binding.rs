//! Binding dispatcher (component C4).
//!
//! No direct analogue exists in the teacher; authored fresh as a pure
//! state machine in its module/error-handling idiom (double-buffered
//! settable knobs per [`crate::double_buffered`], `Id`-keyed records per
//! [`crate::ids`]), matching spec.md §4.4 and §8 property 4/5.

use std::collections::HashMap;

use smithay::input::keyboard::ModifiersState;
use xkbcommon::xkb::{keysyms, Keysym};

use crate::double_buffered::DoubleBuffered;
use crate::ids::{Id, IdAllocator};

pub struct BindingMarker;
pub type BindingId = Id<BindingMarker>;

/// What the binding fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Pointer(u32),
    Xkb(Keysym),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct BindingIntent {
    enabled: bool,
    layout_override: Option<u32>,
}

/// A (trigger, modifiers, enabled?, layout-override?) record owned by a
/// seat, per spec.md §3.
pub struct Binding {
    pub id: BindingId,
    pub trigger: Trigger,
    pub modifiers: ModifiersState,
    intent: DoubleBuffered<BindingIntent>,
    /// Whether an outstanding `pressed` has not yet been observed as
    /// released by the wm — suppresses duplicate press events across
    /// devices (spec.md §4.4, §8 property 5).
    sent_pressed: bool,
}

impl Binding {
    fn new(id: BindingId, trigger: Trigger, modifiers: ModifiersState) -> Self {
        Self {
            id,
            trigger,
            modifiers,
            intent: DoubleBuffered::new(BindingIntent::default()),
            sent_pressed: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.intent.committed().enabled
    }

    pub fn layout_override(&self) -> Option<u32> {
        self.intent.committed().layout_override
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.intent.uncommitted_mut().enabled = enabled;
    }

    pub fn set_layout_override(&mut self, layout: Option<u32>) {
        self.intent.uncommitted_mut().layout_override = layout;
    }

    /// Promote uncommitted enable/layout changes. Returns `true` if
    /// anything observable actually changed.
    pub fn commit(&mut self) -> bool {
        self.intent.commit()
    }

    fn matches(&self, trigger: Trigger, modifiers: ModifiersState) -> bool {
        self.enabled() && self.trigger == trigger && self.modifiers == modifiers
    }

    /// Record a press. Returns `true` the first time (the wm must be
    /// told); `false` if a press is already outstanding, suppressing a
    /// duplicate emission.
    fn mark_pressed(&mut self) -> bool {
        if self.sent_pressed {
            return false;
        }
        self.sent_pressed = true;
        true
    }

    /// Record a release. Returns `true` if a press was actually
    /// outstanding (so a `released` event must reach the wm).
    fn mark_released(&mut self) -> bool {
        std::mem::take(&mut self.sent_pressed)
    }
}

/// Identifies a physical keyboard device, for per-device eaten-keycode
/// tracking (spec.md §4.4, §8 property 4).
pub type KeyboardId = u32;

/// Outcome of dispatching a pointer button event.
pub enum ButtonDispatch {
    /// The button matched an enabled binding.
    Bound {
        binding: BindingId,
        /// Whether a `pressed`/`released` event must reach the wm
        /// (false when suppressed as a duplicate).
        emit: bool,
        /// Only meaningful on release: whether the pressed-button
        /// table is now empty, i.e. `ignore` mode may be exited.
        pressed_table_empty: bool,
    },
    Unbound,
}

/// Outcome of dispatching a key event.
pub enum KeyDispatch {
    Bound { binding: BindingId, emit: bool },
    Unbound,
}

/// Matches pointer buttons and key events against enabled bindings and
/// tracks eaten/pressed state, per spec.md §4.4.
#[derive(Default)]
pub struct BindingDispatcher {
    id_alloc: IdAllocator<BindingMarker>,
    bindings: HashMap<BindingId, Binding>,
    pressed_buttons: HashMap<u32, BindingId>,
    eaten_keys: HashMap<KeyboardId, HashMap<u32, BindingId>>,
}

impl BindingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_pointer_binding(&mut self, button: u32, modifiers: ModifiersState) -> BindingId {
        let id = self.id_alloc.alloc();
        self.bindings.insert(id, Binding::new(id, Trigger::Pointer(button), modifiers));
        id
    }

    pub fn create_xkb_binding(&mut self, keysym: Keysym, modifiers: ModifiersState) -> BindingId {
        let id = self.id_alloc.alloc();
        self.bindings.insert(id, Binding::new(id, Trigger::Xkb(keysym), modifiers));
        id
    }

    pub fn get(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.get(&id)
    }

    pub fn get_mut(&mut self, id: BindingId) -> Option<&mut Binding> {
        self.bindings.get_mut(&id)
    }

    /// Destroying a binding mid-press clears its slot in every pressed
    /// table; a subsequent physical release becomes a no-op for it
    /// (spec.md §5 "cancellation & timeouts").
    pub fn remove_binding(&mut self, id: BindingId) {
        self.bindings.remove(&id);
        self.pressed_buttons.retain(|_, bound| *bound != id);
        for eaten in self.eaten_keys.values_mut() {
            eaten.retain(|_, bound| *bound != id);
        }
    }

    /// Commit every binding's double-buffered intent. Returns the ids
    /// of bindings whose observable state actually changed, for the
    /// wm-update cycle to include in its next batch.
    pub fn commit_all(&mut self) -> Vec<BindingId> {
        self.bindings
            .values_mut()
            .filter_map(|binding| binding.commit().then_some(binding.id))
            .collect()
    }

    /// Dispatch a pointer button event, per spec.md §4.4 "Pointer
    /// buttons".
    pub fn on_pointer_button(
        &mut self,
        button: u32,
        pressed: bool,
        modifiers: ModifiersState,
    ) -> ButtonDispatch {
        if pressed {
            let matched =
                self.bindings.values_mut().find(|b| b.matches(Trigger::Pointer(button), modifiers));
            let Some(binding) = matched else { return ButtonDispatch::Unbound };

            let id = binding.id;
            let emit = binding.mark_pressed();
            self.pressed_buttons.insert(button, id);
            ButtonDispatch::Bound { binding: id, emit, pressed_table_empty: false }
        } else {
            let Some(id) = self.pressed_buttons.remove(&button) else {
                return ButtonDispatch::Unbound;
            };
            let emit = self.bindings.get_mut(&id).map(Binding::mark_released).unwrap_or(false);
            ButtonDispatch::Bound { binding: id, emit, pressed_table_empty: self.pressed_buttons.is_empty() }
        }
    }

    pub fn any_button_pressed(&self) -> bool {
        !self.pressed_buttons.is_empty()
    }

    /// Dispatch a key event, per spec.md §4.4 "Keyboard". `no_translate`
    /// and `translate` are the two keysym/modifier pairs to try, in
    /// that order, mirroring libxkbcommon's consumed-modifiers split.
    pub fn on_key(
        &mut self,
        keyboard: KeyboardId,
        keycode: u32,
        pressed: bool,
        no_translate: (Keysym, ModifiersState),
        translate: (Keysym, ModifiersState),
    ) -> KeyDispatch {
        if pressed {
            if let Some(vt) = vt_switch_target(no_translate.0) {
                tracing::info!(vt, "built-in VT switch binding consumed key");
                // Built-ins are dispatched before user bindings and
                // never reach the wm; caller is expected to invoke the
                // session backend directly based on this branch.
                return KeyDispatch::Unbound;
            }

            let candidates = [no_translate, translate];
            let matched = candidates.into_iter().find_map(|(keysym, mods)| {
                self.bindings.values_mut().find(|b| b.matches(Trigger::Xkb(keysym), mods))
            });
            let Some(binding) = matched else { return KeyDispatch::Unbound };

            let id = binding.id;
            let emit = binding.mark_pressed();
            self.eaten_keys.entry(keyboard).or_default().insert(keycode, id);
            KeyDispatch::Bound { binding: id, emit }
        } else {
            let Some(eaten) = self.eaten_keys.get_mut(&keyboard) else {
                return KeyDispatch::Unbound;
            };
            let Some(id) = eaten.remove(&keycode) else {
                return KeyDispatch::Unbound;
            };
            let emit = self.bindings.get_mut(&id).map(Binding::mark_released).unwrap_or(false);
            KeyDispatch::Bound { binding: id, emit }
        }
    }

    /// Whether `keycode` on `keyboard` was eaten by a binding press and
    /// must not be forwarded to the focused surface.
    pub fn is_eaten(&self, keyboard: KeyboardId, keycode: u32) -> bool {
        self.eaten_keys.get(&keyboard).is_some_and(|eaten| eaten.contains_key(&keycode))
    }
}

/// Maps `XF86Switch_VT_{1..12}` keysyms to the target VT number, per
/// spec.md §4.4 "Built-in mappings".
pub(crate) fn vt_switch_target(keysym: Keysym) -> Option<u32> {
    const BASE: u32 = keysyms::KEY_XF86Switch_VT_1;
    let raw = keysym.raw();
    (BASE..=BASE + 11).contains(&raw).then(|| raw - BASE + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mods() -> ModifiersState {
        ModifiersState::default()
    }

    #[test]
    fn pointer_press_then_release_round_trips() {
        let mut dispatcher = BindingDispatcher::new();
        let id = dispatcher.create_pointer_binding(272, mods());
        dispatcher.get_mut(id).unwrap().set_enabled(true);
        dispatcher.commit_all();

        match dispatcher.on_pointer_button(272, true, mods()) {
            ButtonDispatch::Bound { binding, emit, .. } => {
                assert_eq!(binding, id);
                assert!(emit);
            },
            ButtonDispatch::Unbound => panic!("expected a match"),
        }
        assert!(dispatcher.any_button_pressed());

        match dispatcher.on_pointer_button(272, false, mods()) {
            ButtonDispatch::Bound { emit, pressed_table_empty, .. } => {
                assert!(emit);
                assert!(pressed_table_empty);
            },
            ButtonDispatch::Unbound => panic!("expected a match"),
        }
        assert!(!dispatcher.any_button_pressed());
    }

    #[test]
    fn duplicate_press_across_keyboards_suppressed() {
        let mut dispatcher = BindingDispatcher::new();
        let keysym = Keysym::from(keysyms::KEY_n);
        let id = dispatcher.create_xkb_binding(keysym, mods());
        dispatcher.get_mut(id).unwrap().set_enabled(true);
        dispatcher.commit_all();

        let no_t = (keysym, mods());
        let t = (keysym, mods());

        let first = dispatcher.on_key(1, 100, true, no_t, t);
        assert!(matches!(first, KeyDispatch::Bound { emit: true, .. }));

        // Second device fires the same binding while still held.
        let second = dispatcher.on_key(2, 200, true, no_t, t);
        assert!(matches!(second, KeyDispatch::Bound { emit: false, .. }));

        assert!(dispatcher.is_eaten(1, 100));
        assert!(dispatcher.is_eaten(2, 200));

        let release_first = dispatcher.on_key(1, 100, false, no_t, t);
        assert!(matches!(release_first, KeyDispatch::Bound { emit: false, .. }));

        let release_second = dispatcher.on_key(2, 200, false, no_t, t);
        assert!(matches!(release_second, KeyDispatch::Bound { emit: true, .. }));
    }

    #[test]
    fn unbound_key_is_not_eaten() {
        let mut dispatcher = BindingDispatcher::new();
        let keysym = Keysym::from(keysyms::KEY_n);
        let unrelated = (Keysym::from(keysyms::KEY_m), mods());
        let dispatch = dispatcher.on_key(1, 50, true, unrelated, unrelated);
        assert!(matches!(dispatch, KeyDispatch::Unbound));
        assert!(!dispatcher.is_eaten(1, 50));
        let _ = keysym;
    }

    #[test]
    fn vt_switch_keysym_maps_to_target() {
        let keysym = Keysym::from(keysyms::KEY_XF86Switch_VT_5);
        assert_eq!(vt_switch_target(keysym), Some(5));
        let other = Keysym::from(keysyms::KEY_n);
        assert_eq!(vt_switch_target(other), None);
    }
}
