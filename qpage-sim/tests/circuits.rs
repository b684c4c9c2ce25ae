//! End-to-end circuits on in-process worlds, checked against a dense reference

use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use proptest::prelude::*;
use qpage_core::{GateRequest, Matrix, Precision, Qubit};
use qpage_sim::{FusionConfig, SimulationResult, Simulator, SimulatorConfig};
use std::f64::consts::PI;
use std::time::Duration;

fn q(i: usize) -> Qubit {
    Qubit::new(i)
}

/// Naive full-vector application; `qubits[0]` is the high matrix bit
fn reference_apply(state: &mut [Complex64], matrix: &Matrix<f64>, qubits: &[usize]) {
    let k = qubits.len();
    let old = state.to_vec();
    let mask: usize = qubits.iter().map(|&b| 1 << b).sum();
    for (i, out) in state.iter_mut().enumerate() {
        let row = qubits
            .iter()
            .enumerate()
            .fold(0, |acc, (m, &b)| acc | (((i >> b) & 1) << (k - 1 - m)));
        let mut sum = Complex64::new(0.0, 0.0);
        for col in 0..(1 << k) {
            let j = qubits
                .iter()
                .enumerate()
                .fold(i & !mask, |acc, (m, &b)| acc | (((col >> (k - 1 - m)) & 1) << b));
            sum += matrix[(row, col)] * old[j];
        }
        *out = sum;
    }
}

/// Markers and permutations leave logical amplitudes alone
fn reference_run(num_qubits: usize, gates: &[GateRequest]) -> Vec<Complex64> {
    let mut state = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
    state[0] = Complex64::new(1.0, 0.0);
    for gate in gates {
        if let Some(matrix) = gate.matrix() {
            let qubits: Vec<usize> = gate.qubits().iter().map(|q| q.index()).collect();
            reference_apply(&mut state, &matrix, &qubits);
        }
    }
    state
}

fn config(num_qubits: usize, num_pages: usize) -> SimulatorConfig {
    SimulatorConfig::new(num_qubits)
        .with_pages(num_pages)
        .with_receive_timeout(Duration::from_secs(10))
}

fn assert_matches_reference(result: &SimulationResult, expected: &[Complex64], epsilon: f64) {
    assert_eq!(result.amplitudes.len(), expected.len());
    for (i, (got, want)) in result.amplitudes.iter().zip(expected).enumerate() {
        assert!(
            (got - want).norm() < epsilon,
            "amplitude {} differs: got {}, expected {}",
            i,
            got,
            want
        );
    }
}

fn circuit() -> Vec<GateRequest> {
    vec![
        GateRequest::Hadamard(q(0)),
        GateRequest::Hadamard(q(6)),
        GateRequest::RotationY { qubit: q(5), angle: 0.7 },
        GateRequest::S(q(1)),
        GateRequest::ControlledNot { control: q(0), target: q(6) },
        GateRequest::BeginFusion,
        GateRequest::ControlledPhase { control: q(1), target: q(2), angle: PI / 3.0 },
        GateRequest::U3 { qubit: q(3), theta: 1.1, phi: -0.4, lambda: 0.9 },
        GateRequest::PauliY(q(2)),
        GateRequest::EndFusion,
        GateRequest::Swap(q(1), q(5)),
        GateRequest::Toffoli { controls: [q(5), q(6)], target: q(2) },
        GateRequest::Permute(vec![4, 1, 2, 3, 0, 5, 6]),
        GateRequest::RotationX { qubit: q(0), angle: -1.3 },
        GateRequest::U2 { qubit: q(4), phi: 0.2, lambda: -0.8 },
        GateRequest::ControlledZ { control: q(4), target: q(5) },
        GateRequest::TDagger(q(4)),
        GateRequest::RotationZ { qubit: q(6), angle: 2.1 },
    ]
}

#[test]
fn test_circuit_matches_reference_on_every_world() {
    let gates = circuit();
    let expected = reference_run(7, &gates);
    for (num_processes, num_pages) in [(1, 1), (1, 8), (2, 2), (4, 2), (4, 1), (2, 4)] {
        let result = Simulator::new(config(7, num_pages))
            .run_local(num_processes, &gates)
            .unwrap();
        assert_matches_reference(&result, &expected, 1e-10);
        assert_abs_diff_eq!(result.norm_sqr(), 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_single_precision_matches_within_tolerance() {
    let gates = circuit();
    let expected = reference_run(7, &gates);
    let result = Simulator::new(config(7, 2).with_precision(Precision::Single))
        .run_local(4, &gates)
        .unwrap();
    assert_matches_reference(&result, &expected, 1e-4);
}

#[test]
fn test_fusion_does_not_change_the_result() {
    let gates = circuit();
    let fused = Simulator::new(config(7, 2)).run_local(2, &gates).unwrap();
    let unfused = Simulator::new(config(7, 2).with_fusion(FusionConfig {
        auto_fusion: false,
        max_fused_qubits: 4,
    }))
    .run_local(2, &gates)
    .unwrap();

    for (a, b) in fused.amplitudes.iter().zip(&unfused.amplitudes) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
    }
    let applications = |r: &SimulationResult| r.state_metrics[0].applications();
    assert!(applications(&fused) < applications(&unfused));
    assert!(fused.telemetry[0].gates_fused > 0);
}

#[test]
fn test_circuit_then_inverse_restores_ground_state() {
    let gates: Vec<GateRequest> = circuit()
        .into_iter()
        .filter(|g| g.matrix().is_some())
        .collect();
    let mut full = gates.clone();
    full.extend(gates.iter().rev().map(|g| g.adjoint().unwrap()));

    let result = Simulator::new(config(7, 2)).run_local(4, &full).unwrap();
    assert_abs_diff_eq!(result.probability(0), 1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(result.norm_sqr(), 1.0, epsilon = 1e-10);
}

#[test]
fn test_set_and_clear_on_every_kind_of_qubit() {
    // 7 qubits, 2 pages, 4 processes: q0..q3 in-page, q4 page slot, q5 q6 rank
    let mut gates: Vec<GateRequest> = (0..7).map(|i| GateRequest::Hadamard(q(i))).collect();
    gates.push(GateRequest::Set(q(2)));
    gates.push(GateRequest::Clear(q(4)));
    gates.push(GateRequest::Set(q(6)));

    let result = Simulator::new(config(7, 2)).run_local(4, &gates).unwrap();
    assert_abs_diff_eq!(result.norm_sqr(), 1.0, epsilon = 1e-10);
    for (index, p) in result.probabilities().into_iter().enumerate() {
        let allowed = index & 0b100 != 0 && index & 0b10000 == 0 && index & 0b1000000 != 0;
        if allowed {
            assert_abs_diff_eq!(p, 1.0 / 16.0, epsilon = 1e-10);
        } else {
            assert_abs_diff_eq!(p, 0.0, epsilon = 1e-12);
        }
    }
    assert_eq!(result.state_metrics[0].projections, 3);
}

#[test]
fn test_set_flips_when_value_is_impossible() {
    let gates = vec![
        GateRequest::Set(q(0)),
        GateRequest::Set(q(4)),
        GateRequest::Set(q(6)),
        GateRequest::Clear(q(6)),
    ];
    let result = Simulator::new(config(7, 2)).run_local(4, &gates).unwrap();
    assert_abs_diff_eq!(result.probability(0b0010001), 1.0, epsilon = 1e-12);
    assert_eq!(result.telemetry[0].flips, 4);
}

fn gate_strategy(n: usize) -> impl Strategy<Value = GateRequest> {
    let qubit = (0..n).prop_map(Qubit::new);
    let pair = (0..n, 1..n).prop_map(move |(a, d)| (Qubit::new(a), Qubit::new((a + d) % n)));
    let angle = -PI..PI;
    prop_oneof![
        qubit.clone().prop_map(GateRequest::Hadamard),
        qubit.clone().prop_map(GateRequest::PauliX),
        qubit.clone().prop_map(GateRequest::T),
        (qubit.clone(), angle.clone()).prop_map(|(qubit, angle)| GateRequest::RotationY { qubit, angle }),
        (qubit.clone(), angle.clone(), angle.clone(), angle.clone()).prop_map(|(qubit, theta, phi, lambda)| {
            GateRequest::U3 {
                qubit,
                theta,
                phi,
                lambda,
            }
        }),
        pair.clone()
            .prop_map(|(control, target)| GateRequest::ControlledNot { control, target }),
        (pair.clone(), angle).prop_map(|((control, target), angle)| GateRequest::ControlledPhase {
            control,
            target,
            angle
        }),
        pair.prop_map(|(a, b)| GateRequest::Swap(a, b)),
        Just(GateRequest::BeginFusion),
        Just(GateRequest::EndFusion),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_random_circuits_match_reference(
        gates in prop::collection::vec(gate_strategy(6), 1..24),
        world in prop::sample::select(vec![(1usize, 2usize), (2, 1), (2, 2), (4, 2), (2, 4)]),
        max_fused_qubits in 1usize..=4,
    ) {
        let (num_processes, num_pages) = world;
        let expected = reference_run(6, &gates);
        let config = config(6, num_pages).with_fusion(FusionConfig {
            auto_fusion: true,
            max_fused_qubits,
        });
        let result = Simulator::new(config).run_local(num_processes, &gates).unwrap();
        for (got, want) in result.amplitudes.iter().zip(&expected) {
            prop_assert!((got - want).norm() < 1e-9);
        }
    }
}
