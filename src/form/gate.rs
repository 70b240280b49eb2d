/// Re-entrancy gate of the controller.
///
/// While disarmed every change notification is dropped. The controller disarms it
/// for the duration of its own passes and re-arms it once the guard window elapses.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Gate {
    Armed,
    #[default]
    Disarmed,
}

impl Gate {
    pub fn is_armed(self) -> bool {
        self == Gate::Armed
    }

    pub fn arm(&mut self) {
        *self = Gate::Armed;
    }

    /// Returns whether the gate was armed before the call.
    pub fn disarm(&mut self) -> bool {
        std::mem::replace(self, Gate::Disarmed).is_armed()
    }
}
