//! tests/lifecycle_tests.rs
//! Pruebas de la función de transición (sin runtime ni timers).

#[cfg(test)]
mod tests {
    use crate::models::activation_model::ActivationStatus;
    use crate::models::event_model::ReleaseReason;
    use crate::services::lifecycle::{transition, Effect, LifecycleEvent, LifecycleState};
    use crate::services::registry::EntryGuards;

    fn state(status: ActivationStatus) -> LifecycleState {
        LifecycleState::new(status, EntryGuards::default())
    }

    fn received(code: &str) -> LifecycleEvent {
        LifecycleEvent::PollReceived {
            message: Some(code.to_string()),
        }
    }

    #[test]
    fn terminal_states_ignore_every_event() {
        let events = [
            LifecycleEvent::PollWaiting,
            received("1"),
            LifecycleEvent::PollCancelled,
            LifecycleEvent::ReleaseConfirmed,
            LifecycleEvent::ManualReleaseConfirmed,
            LifecycleEvent::LeaseExpired,
        ];
        for status in [
            ActivationStatus::Cancelled,
            ActivationStatus::Released,
            ActivationStatus::Completed,
        ] {
            for event in &events {
                let t = transition(&state(status), event);
                assert!(t.is_noop(), "{status} accepted {event:?}");
                assert_eq!(t.next, status);
            }
        }
    }

    #[test]
    fn waiting_tick_changes_nothing() {
        let t = transition(&state(ActivationStatus::Active), &LifecycleEvent::PollWaiting);
        assert!(t.is_noop());
        assert_eq!(t.next, ActivationStatus::Active);
    }

    #[test]
    fn first_code_persists_saves_disarms_and_notifies() {
        let t = transition(&state(ActivationStatus::Active), &received("123456"));

        assert_eq!(t.next, ActivationStatus::Received);
        assert_eq!(
            t.effects,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Received,
                    stamp_released: false,
                },
                Effect::SaveMessage("123456".to_string()),
                Effect::DisarmRelease,
                Effect::NotifySmsReceived("123456".to_string()),
            ]
        );
    }

    #[test]
    fn first_code_does_not_schedule_the_resend_yet() {
        let t = transition(&state(ActivationStatus::Waiting), &received("123456"));
        assert!(!t.effects.contains(&Effect::ScheduleResend));

        // Sin guard marcado, el write de estado va primero
        assert!(matches!(t.effects.first(), Some(Effect::Persist { .. })));
    }

    #[test]
    fn code_on_already_received_row_is_saved_without_status_write() {
        // Fila received sin mensaje local (p. ej. caída entre ambos writes)
        let t = transition(&state(ActivationStatus::Received), &received("42"));

        assert!(t.effects.contains(&Effect::SaveMessage("42".to_string())));
        assert!(!t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Persist { .. })));
    }

    #[test]
    fn repeated_code_only_schedules_the_pending_resend() {
        let guards = EntryGuards {
            first_message_saved: true,
            resend_requested: false,
        };
        let t = transition(
            &LifecycleState::new(ActivationStatus::Received, guards),
            &received("123456"),
        );
        assert_eq!(t.effects, vec![Effect::ScheduleResend]);

        let guards = EntryGuards {
            first_message_saved: true,
            resend_requested: true,
        };
        let t = transition(
            &LifecycleState::new(ActivationStatus::Received, guards),
            &received("123456"),
        );
        assert!(t.is_noop());
    }

    #[test]
    fn received_without_text_waits_for_the_code() {
        let t = transition(
            &state(ActivationStatus::Waiting),
            &LifecycleEvent::PollReceived { message: None },
        );
        assert!(t.is_noop());
        assert_eq!(t.next, ActivationStatus::Waiting);
    }

    #[test]
    fn provider_cancellation_is_stamped_and_torn_down() {
        let t = transition(&state(ActivationStatus::Waiting), &LifecycleEvent::PollCancelled);
        assert_eq!(t.next, ActivationStatus::Cancelled);
        assert_eq!(
            t.effects,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Cancelled,
                    stamp_released: true,
                },
                Effect::Teardown,
            ]
        );
    }

    #[test]
    fn auto_release_never_undoes_a_reception() {
        let t = transition(
            &state(ActivationStatus::Received),
            &LifecycleEvent::ReleaseConfirmed,
        );
        assert!(t.is_noop());
        assert_eq!(t.next, ActivationStatus::Received);

        let t = transition(&state(ActivationStatus::Active), &LifecycleEvent::ReleaseConfirmed);
        assert_eq!(t.next, ActivationStatus::Released);
        assert_eq!(
            t.effects,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Released,
                    stamp_released: true,
                },
                Effect::NotifyReleased(ReleaseReason::AutoRelease),
                Effect::Teardown,
            ]
        );
    }

    #[test]
    fn manual_release_applies_to_received_too() {
        let t = transition(
            &state(ActivationStatus::Received),
            &LifecycleEvent::ManualReleaseConfirmed,
        );
        assert_eq!(t.next, ActivationStatus::Released);
        assert!(t
            .effects
            .contains(&Effect::NotifyReleased(ReleaseReason::Manual)));
        assert_eq!(t.effects.last(), Some(&Effect::Teardown));
    }

    #[test]
    fn expiry_finishes_with_provider_only_after_a_code() {
        let t = transition(&state(ActivationStatus::Received), &LifecycleEvent::LeaseExpired);
        assert_eq!(t.next, ActivationStatus::Completed);
        assert_eq!(
            t.effects,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Completed,
                    stamp_released: true,
                },
                Effect::FinishWithProvider,
                Effect::Teardown,
            ]
        );

        let t = transition(&state(ActivationStatus::Active), &LifecycleEvent::LeaseExpired);
        assert_eq!(t.next, ActivationStatus::Completed);
        assert!(!t.effects.contains(&Effect::FinishWithProvider));
    }

    #[test]
    fn teardown_is_always_last() {
        for status in [
            ActivationStatus::Active,
            ActivationStatus::Waiting,
            ActivationStatus::Received,
        ] {
            for event in [
                LifecycleEvent::PollCancelled,
                LifecycleEvent::ManualReleaseConfirmed,
                LifecycleEvent::LeaseExpired,
            ] {
                let t = transition(&state(status), &event);
                let position = t.effects.iter().position(|e| *e == Effect::Teardown);
                assert_eq!(position, Some(t.effects.len() - 1), "{status} {event:?}");
            }
        }
    }
}
