//=========================================================================
// Command Collector
//=========================================================================
//
// Host command collector with bounded polling and shutdown detection.
//
// Architecture:
//   Receiver<HostCommand> → collect_tick() → commands → TickControl
//
// A disconnected host counts as an exit request.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{Receiver, TryRecvError};
use log::warn;

//=== Internal Dependencies ===============================================

use super::HostCommand;
use crate::core::TickControl;

//=== CommandCollector ====================================================

/// Drains host commands once per tick, at most `MAX_COMMANDS_PER_TICK`.
pub(crate) struct CommandCollector {
    receiver: Receiver<HostCommand>,
    commands: Vec<HostCommand>,
}

impl CommandCollector {
    pub(crate) const MAX_COMMANDS_PER_TICK: usize = 32;

    pub(crate) fn new(receiver: Receiver<HostCommand>) -> Self {
        Self {
            receiver,
            commands: Vec::with_capacity(4),
        }
    }

    /// Collects pending commands for this tick.
    ///
    /// Returns `Exit` when the host disconnected or sent `ExitGame`. An
    /// `ExitGame` command is kept as the last collected command.
    pub(crate) fn collect_tick(&mut self) -> TickControl {
        self.commands.clear();
        let mut drained = 0;

        while drained < Self::MAX_COMMANDS_PER_TICK {
            match self.receiver.try_recv() {
                Ok(command) => {
                    let exit = command == HostCommand::ExitGame;
                    self.commands.push(command);
                    if exit {
                        return TickControl::Exit;
                    }
                    drained += 1;
                }
                Err(TryRecvError::Disconnected) => return TickControl::Exit,
                Err(TryRecvError::Empty) => break,
            }
        }

        if drained >= Self::MAX_COMMANDS_PER_TICK {
            warn!("Host command backlog: drained {} commands this tick", drained);
        }

        TickControl::Continue
    }

    /// Takes the collected commands, leaving an empty buffer.
    pub(crate) fn take_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.commands)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn collect_handles_empty_queue() {
        let (_tx, rx) = unbounded::<HostCommand>();
        let mut collector = CommandCollector::new(rx);

        assert_eq!(collector.collect_tick(), TickControl::Continue);
        assert!(collector.take_commands().is_empty());
    }

    #[test]
    fn collect_keeps_send_order() {
        let (tx, rx) = unbounded();
        let mut collector = CommandCollector::new(rx);

        tx.send(HostCommand::StartNewGame).unwrap();
        tx.send(HostCommand::SaveGame("slotA".into())).unwrap();

        assert_eq!(collector.collect_tick(), TickControl::Continue);
        assert_eq!(
            collector.take_commands(),
            vec![HostCommand::StartNewGame, HostCommand::SaveGame("slotA".into())]
        );
        assert!(collector.take_commands().is_empty());
    }

    #[test]
    fn collect_stops_at_exit() {
        let (tx, rx) = unbounded();
        let mut collector = CommandCollector::new(rx);

        tx.send(HostCommand::TogglePause).unwrap();
        tx.send(HostCommand::ExitGame).unwrap();
        tx.send(HostCommand::StartNewGame).unwrap();

        assert_eq!(collector.collect_tick(), TickControl::Exit);
        assert_eq!(
            collector.take_commands(),
            vec![HostCommand::TogglePause, HostCommand::ExitGame]
        );
    }

    #[test]
    fn collect_clears_previous_commands() {
        let (tx, rx) = unbounded();
        let mut collector = CommandCollector::new(rx);

        tx.send(HostCommand::TogglePause).unwrap();
        collector.collect_tick();
        assert_eq!(collector.take_commands().len(), 1);

        collector.collect_tick();
        assert!(collector.take_commands().is_empty());
    }

    #[test]
    fn collect_is_bounded_per_tick() {
        let (tx, rx) = unbounded();
        let mut collector = CommandCollector::new(rx);

        for _ in 0..CommandCollector::MAX_COMMANDS_PER_TICK + 5 {
            tx.send(HostCommand::TogglePause).unwrap();
        }

        collector.collect_tick();
        assert_eq!(collector.take_commands().len(), CommandCollector::MAX_COMMANDS_PER_TICK);

        collector.collect_tick();
        assert_eq!(collector.take_commands().len(), 5);
    }

    #[test]
    fn collect_returns_exit_on_disconnect() {
        let (tx, rx) = unbounded::<HostCommand>();
        let mut collector = CommandCollector::new(rx);

        drop(tx);

        assert_eq!(collector.collect_tick(), TickControl::Exit);
    }
}
