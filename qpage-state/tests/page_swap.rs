//! Multi-rank tests of page-crossing application

use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use qpage_core::{GateRequest, Matrix, Qubit};
use qpage_state::{Locality, PagedState, Projection, StateError, SwapPlan};
use qpage_transport::{
    Communicator, ErrorCode, FaultPlan, FaultySubstrate, LocalCluster, LocalOptions, Substrate,
};
use std::f64::consts::PI;
use std::time::Duration;

fn q(i: usize) -> Qubit {
    Qubit::new(i)
}

fn quick() -> LocalOptions {
    LocalOptions {
        receive_timeout: Duration::from_secs(10),
    }
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

fn reference_run(num_qubits: usize, gates: &[GateRequest]) -> Vec<Complex64> {
    let mut state = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
    state[0] = Complex64::new(1.0, 0.0);
    for gate in gates {
        let qubits: Vec<usize> = gate.qubits().iter().map(|q| q.index()).collect();
        reference_apply(&mut state, &gate.matrix().unwrap(), &qubits);
    }
    state
}

fn apply<S: Substrate>(state: &mut PagedState<f64>, comm: &Communicator<S>, gate: &GateRequest) -> Result<(), StateError> {
    let matrix = gate.matrix().unwrap();
    let qubits = gate.qubits();
    match state.classify(&qubits) {
        Locality::Local => {
            state.local_apply(&matrix, &qubits);
            Ok(())
        }
        Locality::PageCrossing => state.apply_page_crossing(&matrix, &qubits, comm),
    }
}

fn circuit() -> Vec<GateRequest> {
    vec![
        GateRequest::Hadamard(q(0)),
        GateRequest::Hadamard(q(6)),
        GateRequest::RotationY { qubit: q(5), angle: 0.7 },
        GateRequest::ControlledNot { control: q(0), target: q(6) },
        GateRequest::ControlledPhase { control: q(6), target: q(4), angle: PI / 3.0 },
        GateRequest::U3 { qubit: q(3), theta: 1.1, phi: -0.4, lambda: 0.9 },
        GateRequest::Swap(q(1), q(5)),
        GateRequest::Toffoli { controls: [q(5), q(6)], target: q(2) },
        GateRequest::RotationX { qubit: q(6), angle: -1.3 },
        GateRequest::ControlledZ { control: q(4), target: q(5) },
        GateRequest::TDagger(q(4)),
    ]
}

fn run_distributed(num_processes: usize, num_pages: usize, gates: &[GateRequest]) -> Vec<Complex64> {
    let results = LocalCluster::run(num_processes, quick(), |substrate| {
        let comm = Communicator::new(substrate).unwrap();
        let mut state = PagedState::<f64>::initialize(7, num_pages, comm.rank().index(), comm.size()).unwrap();
        for gate in gates {
            apply(&mut state, &comm, gate).unwrap();
        }
        state.collect_state_vector(&comm).unwrap()
    })
    .unwrap();
    results.into_iter().next().flatten().unwrap()
}

#[test]
fn test_distributed_runs_match_reference() {
    let gates = circuit();
    let expected = reference_run(7, &gates);
    for (processes, pages) in [(1, 1), (1, 8), (2, 2), (2, 4), (4, 1), (4, 2), (4, 4), (8, 1)] {
        let actual = run_distributed(processes, pages, &gates);
        for (a, e) in actual.iter().zip(&expected) {
            assert_abs_diff_eq!(a.re, e.re, epsilon = 1e-10);
            assert_abs_diff_eq!(a.im, e.im, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_gate_and_inverse_restore_state_across_pages() {
    let results = LocalCluster::run(4, quick(), |substrate| {
        let comm = Communicator::new(substrate).unwrap();
        let mut state = PagedState::<f64>::initialize(6, 2, comm.rank().index(), comm.size()).unwrap();
        for gate in [GateRequest::Hadamard(q(1)), GateRequest::Hadamard(q(5)), GateRequest::Hadamard(q(3))] {
            apply(&mut state, &comm, &gate).unwrap();
        }
        let before = state.pages().to_vec();
        let gates = [
            GateRequest::RotationX { qubit: q(5), angle: 0.37 },
            GateRequest::ControlledPhase { control: q(3), target: q(4), angle: 1.9 },
            GateRequest::U2 { qubit: q(0), phi: 0.2, lambda: 0.5 },
        ];
        for gate in &gates {
            apply(&mut state, &comm, gate).unwrap();
        }
        for gate in gates.iter().rev() {
            apply(&mut state, &comm, &gate.adjoint().unwrap()).unwrap();
        }
        (before, state.pages().to_vec(), state.metrics().page_crossing_applications)
    })
    .unwrap();

    for (before, after, crossings) in results {
        // H(q5), H(q3), then two crossings each way
        assert_eq!(crossings, 6);
        for (a, b) in before.iter().flatten().zip(after.iter().flatten()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_exchange_is_symmetric_and_lossless() {
    // 4 qubits, one page per rank, 2 ranks: position 3 is the rank bit
    let results = LocalCluster::run(2, quick(), |substrate| {
        let comm = Communicator::new(substrate).unwrap();
        let state = PagedState::<f64>::initialize(4, 1, comm.rank().index(), comm.size()).unwrap();
        let plan = SwapPlan::new(state.layout(), state.permutation(), &[q(3)]).unwrap();
        let me = comm.rank().index();
        let original: Vec<Vec<Complex64>> = vec![(0..8).map(|i| Complex64::new(me as f64, i as f64)).collect()];
        let mut pages = original.clone();
        let datatype = comm.datatype_of::<Complex64>().unwrap();
        let sent = plan
            .exchange(&mut pages, &comm, &datatype, qpage_transport::Tag::new(99))
            .unwrap();
        (plan.positions().to_vec(), original, pages, sent)
    })
    .unwrap();

    let (positions, _, _, sent) = &results[0];
    assert_eq!(positions, &vec![2]);
    assert_eq!(*sent, 4);
    let (_, original0, after0, _) = &results[0];
    let (_, original1, after1, _) = &results[1];
    for offset in 0..8 {
        if offset & 0b100 == 0 {
            // partner bit equals own rank bit: stays
            assert_eq!(after0[0][offset], original0[0][offset]);
            assert_eq!(after1[0][offset ^ 0b100], original1[0][offset ^ 0b100]);
        } else {
            // rank 0 receives rank 1's amplitudes with partner bit 0, and vice versa
            assert_eq!(after0[0][offset], original1[0][offset ^ 0b100]);
            assert_eq!(after1[0][offset ^ 0b100], original0[0][offset]);
        }
    }
    let mut all: Vec<(u64, u64)> = after0[0]
        .iter()
        .chain(after1[0].iter())
        .map(|a| (a.re as u64, a.im as u64))
        .collect();
    all.sort_unstable();
    let mut expected: Vec<(u64, u64)> = (0..2).flat_map(|r| (0..8).map(move |i| (r, i))).collect();
    expected.sort_unstable();
    assert_eq!(all, expected);
}

#[test]
fn test_transport_failure_leaves_pages_unchanged() {
    // fail on the first round and on the write-back round
    for failing_call in [0usize, 1] {
        let results = LocalCluster::run(2, quick(), |substrate| {
            let rank = substrate.rank().unwrap();
            let faulty = if rank == 0 {
                FaultySubstrate::new(substrate, FaultPlan::send_receive(failing_call, ErrorCode::INTERN))
            } else {
                FaultySubstrate::passthrough(substrate)
            };
            let comm = Communicator::new(faulty).unwrap();
            let mut state = PagedState::<f64>::initialize(5, 2, rank, 2).unwrap();
            state.local_apply(&GateRequest::Hadamard(q(0)).matrix().unwrap(), &[q(0)]);
            state.local_apply(&GateRequest::RotationY { qubit: q(2), angle: 0.4 }.matrix().unwrap(), &[q(2)]);
            let before = state.pages().to_vec();
            let err = state
                .apply_page_crossing(&GateRequest::Hadamard(q(4)).matrix().unwrap(), &[q(4)], &comm)
                .unwrap_err();
            (before == state.pages(), err, state.metrics().page_crossing_applications)
        })
        .unwrap();

        for (rank, (unchanged, err, applications)) in results.into_iter().enumerate() {
            assert!(unchanged, "rank {} committed a partial swap", rank);
            assert_eq!(applications, 0);
            match err {
                StateError::Transport(t) => {
                    assert_eq!(t.operation(), Some("send_receive"));
                    let expected = if rank == 0 { ErrorCode::INTERN } else { ErrorCode::DISCONNECTED };
                    assert_eq!(t.code(), Some(expected));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }
}

#[test]
fn test_set_forces_value_on_every_kind_of_qubit() {
    // q1 in-page, q4 page slot, q5 rank bit
    for target in [1usize, 4, 5] {
        let results = LocalCluster::run(2, quick(), |substrate| {
            let comm = Communicator::new(substrate).unwrap();
            let mut state = PagedState::<f64>::initialize(6, 2, comm.rank().index(), comm.size()).unwrap();
            for gate in [GateRequest::Hadamard(q(target)), GateRequest::Hadamard(q(0))] {
                apply(&mut state, &comm, &gate).unwrap();
            }
            let outcome = state.set(q(target), true, &comm).unwrap();
            (outcome, state.collect_state_vector(&comm).unwrap())
        })
        .unwrap();

        assert!(matches!(results[0].0, Projection::Projected { probability } if (probability - 0.5).abs() < 1e-12));
        let full = results[0].1.as_ref().unwrap();
        let mut norm = 0.0;
        for (index, amp) in full.iter().enumerate() {
            if index & (1 << target) == 0 {
                assert_abs_diff_eq!(amp.norm(), 0.0, epsilon = 1e-12);
            }
            norm += amp.norm_sqr();
        }
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_set_reports_flip_for_impossible_value() {
    let results = LocalCluster::run(2, quick(), |substrate| {
        let comm = Communicator::new(substrate).unwrap();
        let mut state = PagedState::<f64>::initialize(5, 1, comm.rank().index(), comm.size()).unwrap();
        let before = state.pages().to_vec();
        let outcome = state.set(q(4), true, &comm).unwrap();
        (outcome, before == state.pages())
    })
    .unwrap();
    for (outcome, unchanged) in results {
        assert_eq!(outcome, Projection::Flip);
        assert!(unchanged);
    }
}
