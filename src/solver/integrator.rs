//! Companion models for energy-storage devices.
//!
//! Each timestep a capacitor or inductor is replaced by a conductance in
//! parallel with a current source. With `v` the voltage across the device
//! from terminal 0 to terminal 1, the current from terminal 0 to 1 is:
//!   i = G * v + I_hist
//!
//! Capacitor (i = C dv/dt):
//!   BE:   G = C/dt,   I_hist = -C * V_prev / dt
//!   Trap: G = 2C/dt,  I_hist = -(G * V_prev + I_prev)
//!
//! Inductor (v = L di/dt):
//!   BE:   G = dt/L,   I_hist = I_prev
//!   Trap: G = dt/2L,  I_hist = I_prev + G * V_prev

use super::state::{CapacitorState, InductorState};
use super::{IntegrationMethod, MIN_CAPACITANCE, MIN_INDUCTANCE, MIN_TIMESTEP};

/// Linear conductance plus constant current standing in for a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Companion {
    /// Conductance in siemens
    pub conductance: f64,
    /// Current at zero voltage, flowing from terminal 0 to 1
    pub history: f64,
}

impl Companion {
    /// Current from terminal 0 to 1 for voltage `v` across the device.
    pub fn current(&self, v: f64) -> f64 {
        self.conductance * v + self.history
    }
}

/// Integration rule for this timestep.
///
/// Backward Euler is used until history exists and whenever a switch is
/// electrically connected, since trapezoidal rings on discontinuities.
pub fn resolve_method(
    configured: IntegrationMethod,
    history_ready: bool,
    switch_connected: bool,
) -> IntegrationMethod {
    if configured == IntegrationMethod::BackwardEuler || !history_ready || switch_connected {
        IntegrationMethod::BackwardEuler
    } else {
        IntegrationMethod::Trapezoidal
    }
}

/// Companion model of a capacitor.
pub fn capacitor_companion(
    capacitance: f64,
    dt: f64,
    method: IntegrationMethod,
    history: &CapacitorState,
) -> Companion {
    let c = capacitance.max(MIN_CAPACITANCE);
    let dt = dt.max(MIN_TIMESTEP);
    match method {
        IntegrationMethod::BackwardEuler => {
            let g = c / dt;
            Companion {
                conductance: g,
                history: -g * history.prev_voltage,
            }
        }
        IntegrationMethod::Trapezoidal => {
            let g = 2.0 * c / dt;
            Companion {
                conductance: g,
                history: -(g * history.prev_voltage + history.prev_current),
            }
        }
    }
}

/// Companion model of an inductor.
pub fn inductor_companion(
    inductance: f64,
    dt: f64,
    method: IntegrationMethod,
    history: &InductorState,
) -> Companion {
    let l = inductance.max(MIN_INDUCTANCE);
    let dt = dt.max(MIN_TIMESTEP);
    match method {
        IntegrationMethod::BackwardEuler => Companion {
            conductance: dt / l,
            history: history.prev_current,
        },
        IntegrationMethod::Trapezoidal => {
            let g = dt / (2.0 * l);
            Companion {
                conductance: g,
                history: history.prev_current + g * history.prev_voltage,
            }
        }
    }
}

/// Capacitor history after a solve produced `voltage` and `current`.
pub fn advance_capacitor(capacitance: f64, voltage: f64, current: f64) -> CapacitorState {
    CapacitorState {
        prev_voltage: voltage,
        prev_charge: capacitance.max(MIN_CAPACITANCE) * voltage,
        prev_current: current,
    }
}

/// Inductor history after a solve produced `voltage` and `current`.
pub fn advance_inductor(voltage: f64, current: f64) -> InductorState {
    InductorState {
        prev_current: current,
        prev_voltage: voltage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_method_resolution() {
        use IntegrationMethod::*;
        assert_eq!(resolve_method(Trapezoidal, false, false), BackwardEuler);
        assert_eq!(resolve_method(Trapezoidal, true, false), Trapezoidal);
        assert_eq!(resolve_method(Trapezoidal, true, true), BackwardEuler);
        assert_eq!(resolve_method(BackwardEuler, true, false), BackwardEuler);
    }

    #[test]
    fn test_capacitor_backward_euler() {
        let h = CapacitorState {
            prev_voltage: 2.0,
            prev_charge: 2e-6,
            prev_current: 0.0,
        };
        let c = capacitor_companion(1e-6, 1e-3, IntegrationMethod::BackwardEuler, &h);
        assert_relative_eq!(c.conductance, 1e-3);
        // Holding the previous voltage draws no current
        assert_relative_eq!(c.current(2.0), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_capacitor_trapezoidal() {
        let h = CapacitorState {
            prev_voltage: 1.0,
            prev_charge: 1e-6,
            prev_current: 0.5e-3,
        };
        let c = capacitor_companion(1e-6, 1e-3, IntegrationMethod::Trapezoidal, &h);
        assert_relative_eq!(c.conductance, 2e-3);
        assert_relative_eq!(c.history, -(2e-3 + 0.5e-3));
    }

    #[test]
    fn test_inductor_companions() {
        let h = InductorState {
            prev_current: 0.1,
            prev_voltage: 2.0,
        };
        let be = inductor_companion(0.1, 1e-3, IntegrationMethod::BackwardEuler, &h);
        assert_relative_eq!(be.conductance, 1e-2);
        assert_relative_eq!(be.current(0.0), 0.1);

        let tr = inductor_companion(0.1, 1e-3, IntegrationMethod::Trapezoidal, &h);
        assert_relative_eq!(tr.conductance, 5e-3);
        assert_relative_eq!(tr.history, 0.1 + 5e-3 * 2.0);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let c = capacitor_companion(0.0, 0.0, IntegrationMethod::BackwardEuler, &CapacitorState::default());
        assert!(c.conductance.is_finite());
        let l = inductor_companion(0.0, 1e-3, IntegrationMethod::BackwardEuler, &InductorState::default());
        assert!(l.conductance.is_finite());
    }
}
