//! Generic table-driven state machine.
//!
//! A direct generalization of the SOCKS5 session state runtime: state
//! ids are table indices (enforced at construction time), hooks fire
//! only on an actual transition, and dispatching an event with no hook
//! registered for the current state is a programmer error — it panics
//! rather than returning an error, exactly like the original runtime's
//! `abort()` calls.

pub struct StateDef<Ctx> {
    pub state: u32,
    pub on_arrival: Option<fn(u32, &mut Ctx)>,
    pub on_departure: Option<fn(u32, &mut Ctx)>,
    pub on_read_ready: Option<fn(&mut Ctx) -> u32>,
    pub on_write_ready: Option<fn(&mut Ctx) -> u32>,
    pub on_block_ready: Option<fn(&mut Ctx) -> u32>,
}

impl<Ctx> StateDef<Ctx> {
    pub const fn new(state: u32) -> Self {
        Self {
            state,
            on_arrival: None,
            on_departure: None,
            on_read_ready: None,
            on_write_ready: None,
            on_block_ready: None,
        }
    }
}

pub struct StateMachine<Ctx> {
    states: Vec<StateDef<Ctx>>,
    initial: u32,
    current: Option<u32>,
}

impl<Ctx> StateMachine<Ctx> {
    /// Builds the machine. Panics if any `states[i].state != i`, or if
    /// `initial` is out of range — these are wiring bugs, not runtime
    /// conditions a caller should recover from.
    pub fn new(states: Vec<StateDef<Ctx>>, initial: u32) -> Self {
        for (i, s) in states.iter().enumerate() {
            assert_eq!(i as u32, s.state, "state ids must equal their table index");
        }
        assert!((initial as usize) < states.len(), "initial state out of range");
        Self { states, initial, current: None }
    }

    pub fn state(&self) -> u32 {
        self.current.unwrap_or(self.initial)
    }

    fn handle_first(&mut self, ctx: &mut Ctx) {
        if self.current.is_none() {
            self.current = Some(self.initial);
            if let Some(hook) = self.states[self.initial as usize].on_arrival {
                hook(self.initial, ctx);
            }
        }
    }

    fn jump(&mut self, next: u32, ctx: &mut Ctx) {
        assert!((next as usize) < self.states.len(), "transition to unknown state {}", next);
        let cur = self.current.expect("jump called before first dispatch");
        if cur != next {
            if let Some(hook) = self.states[cur as usize].on_departure {
                hook(cur, ctx);
            }
            self.current = Some(next);
            if let Some(hook) = self.states[next as usize].on_arrival {
                hook(next, ctx);
            }
        }
    }

    pub fn handle_read(&mut self, ctx: &mut Ctx) -> u32 {
        self.handle_first(ctx);
        let cur = self.current.unwrap();
        let hook = self.states[cur as usize]
            .on_read_ready
            .unwrap_or_else(|| panic!("state {} dispatched a read event with no on_read_ready hook", cur));
        let next = hook(ctx);
        self.jump(next, ctx);
        next
    }

    pub fn handle_write(&mut self, ctx: &mut Ctx) -> u32 {
        self.handle_first(ctx);
        let cur = self.current.unwrap();
        let hook = self.states[cur as usize]
            .on_write_ready
            .unwrap_or_else(|| panic!("state {} dispatched a write event with no on_write_ready hook", cur));
        let next = hook(ctx);
        self.jump(next, ctx);
        next
    }

    pub fn handle_block(&mut self, ctx: &mut Ctx) -> u32 {
        self.handle_first(ctx);
        let cur = self.current.unwrap();
        let hook = self.states[cur as usize]
            .on_block_ready
            .unwrap_or_else(|| panic!("state {} dispatched a block event with no on_block_ready hook", cur));
        let next = hook(ctx);
        self.jump(next, ctx);
        next
    }

    pub fn handle_close(&mut self, ctx: &mut Ctx) {
        if let Some(cur) = self.current {
            if let Some(hook) = self.states[cur as usize].on_departure {
                hook(cur, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        arrivals: Vec<u32>,
        departures: Vec<u32>,
    }

    const S0: u32 = 0;
    const S1: u32 = 1;

    fn states() -> Vec<StateDef<Ctx>> {
        let mut s0 = StateDef::new(S0);
        s0.on_arrival = Some(|s, ctx: &mut Ctx| ctx.arrivals.push(s));
        s0.on_departure = Some(|s, ctx: &mut Ctx| ctx.departures.push(s));
        s0.on_read_ready = Some(|_ctx: &mut Ctx| S1);

        let mut s1 = StateDef::new(S1);
        s1.on_arrival = Some(|s, ctx: &mut Ctx| ctx.arrivals.push(s));
        s1.on_read_ready = Some(|_ctx: &mut Ctx| S1); // stays in S1

        vec![s0, s1]
    }

    #[test]
    fn fires_arrival_on_first_dispatch_only() {
        let mut stm = StateMachine::new(states(), S0);
        let mut ctx = Ctx { arrivals: vec![], departures: vec![] };
        stm.handle_read(&mut ctx); // S0 -> S1, arrival(S0) then departure(S0) then arrival(S1)
        assert_eq!(ctx.arrivals, vec![S0, S1]);
        assert_eq!(ctx.departures, vec![S0]);
    }

    #[test]
    fn no_hooks_fire_on_self_transition() {
        let mut stm = StateMachine::new(states(), S0);
        let mut ctx = Ctx { arrivals: vec![], departures: vec![] };
        stm.handle_read(&mut ctx); // -> S1
        stm.handle_read(&mut ctx); // S1 -> S1, no-op transition
        assert_eq!(ctx.arrivals, vec![S0, S1]);
    }

    #[test]
    #[should_panic(expected = "on_write_ready")]
    fn missing_hook_panics() {
        let mut stm = StateMachine::new(states(), S0);
        let mut ctx = Ctx { arrivals: vec![], departures: vec![] };
        stm.handle_write(&mut ctx);
    }

    #[test]
    #[should_panic(expected = "state ids must equal their table index")]
    fn misordered_table_panics_at_construction() {
        let mut s1 = StateDef::<Ctx>::new(1);
        s1.on_read_ready = Some(|_ctx: &mut Ctx| 0);
        let _ = StateMachine::new(vec![s1], 0);
    }
}
