//! Pointer gesture classification.
//!
//! Native pointer events are folded through a pure [`transition`] function that decides which
//! engine commands (if any) a single event produces. A gesture is either a click or a drag, never
//! both:
//!
//! - press + release with no position change in between is a click, sent as a discrete
//!   [`EngineCommand::Click`] at the release position;
//! - the first move with a non-zero delta while pressed turns the gesture into a drag and sends
//!   `SetDragging(true)` exactly once; the release sends `SetDragging(false)` exactly once;
//! - moves while not pressed are forwarded as hover updates.
//!
//! Position updates are suppressed when the position equals the last forwarded one.

use crate::coords::EnginePoint;
use crate::engine::Engine;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down(EnginePoint),
    Move(EnginePoint),
    Up(EnginePoint),
    /// The pointer left the surface (or the host lost pointer capture).
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Pressed,
    Dragging,
    /// The button was just released. Behaves like `Idle` for the next event.
    Released { clicked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    MoveMouse { x: i32, y: i32 },
    SetDragging(bool),
    Click { x: i32, y: i32 },
}

impl EngineCommand {
    pub fn apply<E: Engine + ?Sized>(self, engine: &mut E) -> Result<(), EngineError> {
        match self {
            EngineCommand::MoveMouse { x, y } => engine.move_mouse(x, y),
            EngineCommand::SetDragging(dragging) => engine.set_dragging(dragging),
            EngineCommand::Click { x, y } => engine.mouse_click(x, y),
        }
    }
}

/// Commands produced by one event. A single event never yields more than two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Commands {
    buf: [Option<EngineCommand>; 2],
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, command: EngineCommand) {
        let slot = self.buf.iter_mut().find(|slot| slot.is_none());
        debug_assert!(slot.is_some(), "more than two commands for one pointer event");
        if let Some(slot) = slot {
            *slot = Some(command);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = EngineCommand> + '_ {
        self.buf.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buf[0].is_none()
    }

    pub fn to_vec(&self) -> Vec<EngineCommand> {
        self.iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerState {
    pub phase: GesturePhase,
    pub position: EnginePoint,
    pub press_position: Option<EnginePoint>,
    /// Last position sent to the engine's move operation.
    pub last_forwarded: Option<EnginePoint>,
}

impl PointerState {
    pub fn button_down(&self) -> bool {
        matches!(self.phase, GesturePhase::Pressed | GesturePhase::Dragging)
    }

    /// Only ever true while `button_down` is.
    pub fn dragging(&self) -> bool {
        self.phase == GesturePhase::Dragging
    }
}

fn forward_position(next: &mut PointerState, commands: &mut Commands, p: EnginePoint) {
    if next.last_forwarded != Some(p) {
        commands.push(EngineCommand::MoveMouse { x: p.x, y: p.y });
        next.last_forwarded = Some(p);
    }
}

pub fn transition(state: &PointerState, event: PointerEvent) -> (PointerState, Commands) {
    let mut next = *state;
    let mut commands = Commands::new();

    match event {
        PointerEvent::Down(p) => {
            // A missed release still has to end the previous drag.
            if state.dragging() {
                commands.push(EngineCommand::SetDragging(false));
            }
            next.phase = GesturePhase::Pressed;
            next.position = p;
            next.press_position = Some(p);
        }
        PointerEvent::Move(p) => {
            let moved = p != state.position;
            next.position = p;
            match state.phase {
                GesturePhase::Pressed if moved => {
                    next.phase = GesturePhase::Dragging;
                    commands.push(EngineCommand::SetDragging(true));
                    forward_position(&mut next, &mut commands, p);
                }
                GesturePhase::Dragging if moved => {
                    forward_position(&mut next, &mut commands, p);
                }
                GesturePhase::Pressed | GesturePhase::Dragging => {}
                GesturePhase::Idle | GesturePhase::Released { .. } => {
                    next.phase = GesturePhase::Idle;
                    forward_position(&mut next, &mut commands, p);
                }
            }
        }
        PointerEvent::Up(p) => {
            next.position = p;
            next.press_position = None;
            match state.phase {
                GesturePhase::Pressed => {
                    commands.push(EngineCommand::Click { x: p.x, y: p.y });
                    next.phase = GesturePhase::Released { clicked: true };
                }
                GesturePhase::Dragging => {
                    commands.push(EngineCommand::SetDragging(false));
                    next.phase = GesturePhase::Released { clicked: false };
                }
                // Stray release (the press happened outside the surface).
                GesturePhase::Idle | GesturePhase::Released { .. } => {
                    next.phase = GesturePhase::Idle;
                }
            }
        }
        PointerEvent::Leave => {
            if state.dragging() {
                commands.push(EngineCommand::SetDragging(false));
            }
            next.phase = GesturePhase::Idle;
            next.press_position = None;
        }
    }

    (next, commands)
}

#[derive(Debug, Clone, Default)]
pub struct InputStateMachine {
    state: PointerState,
}

impl InputStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PointerState {
        &self.state
    }

    /// Applies `event` to the state without talking to an engine.
    pub fn handle(&mut self, event: PointerEvent) -> Commands {
        let (next, commands) = transition(&self.state, event);
        self.state = next;
        commands
    }

    /// Applies `event` and forwards the resulting commands to `engine`.
    ///
    /// Engines without interaction exports silently ignore pointer commands.
    pub fn dispatch<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        event: PointerEvent,
    ) -> Result<Commands, EngineError> {
        let commands = self.handle(event);
        for command in commands.iter() {
            match command.apply(engine) {
                Ok(()) => {}
                Err(EngineError::Unsupported(call)) => {
                    tracing::trace!(call, "engine ignores pointer command");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(commands)
    }
}
