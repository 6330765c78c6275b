mod common;

use binarust_core::context::list_context;
use binarust_core::tensor::zeros_f64;
use binarust_core::utils::reference::{
    ref_binary_connect_affine, ref_grad_binary_connect_affine, RefArray,
};
use binarust_core::utils::testing::{FunctionTester, TesterConfig};
use binarust_core::{binary_connect_affine_op, BinaryConnectAffineConfig, Tensor};
use common::{input, randn_f64, setup};
use rand::rngs::StdRng;
use rand::SeedableRng;

const SEED: u64 = 313;
const CASES: [(isize, &[usize]); 2] = [(1, &[12, 2, 3]), (2, &[4, 4])];

fn ref_input(inputs: &[Option<RefArray>], index: usize) -> &RefArray {
    inputs[index].as_ref().expect("reference input present")
}

#[test]
fn binary_connect_affine_forward_backward() {
    setup();
    let contexts = list_context("BinaryConnectAffine").unwrap();
    assert!(!contexts.is_empty());

    for (ctx, func_name) in &contexts {
        for (base_axis, weight_shape) in CASES {
            for with_bias in [true, false] {
                let mut rng = StdRng::seed_from_u64(SEED);
                let x = randn_f64(&[2, 3, 4], &mut rng);
                let w = randn_f64(weight_shape, &mut rng);
                let wb = zeros_f64(weight_shape).unwrap();
                let b = with_bias.then(|| randn_f64(&weight_shape[1..], &mut rng));
                let inputs: Vec<Option<Tensor>> = vec![Some(x), Some(w), Some(wb), b];

                let config = BinaryConnectAffineConfig::new(base_axis);
                let axis = base_axis as usize;
                let tester = FunctionTester::new(*ctx, inputs)
                    .with_config(
                        TesterConfig::default()
                            .with_seed(SEED)
                            .with_backward(vec![true, true, false, true])
                            .with_atol_b(1e-2),
                    )
                    .with_ref_grad(|ins, dy| {
                        ref_grad_binary_connect_affine(
                            ref_input(ins, 0),
                            ref_input(ins, 1),
                            ins[3].as_ref(),
                            dy,
                            axis,
                            -1.0,
                        )
                    });

                let result = tester.run(
                    |ins| {
                        binary_connect_affine_op(
                            input(ins, 0)?,
                            input(ins, 1)?,
                            input(ins, 2)?,
                            ins[3].as_ref(),
                            &config,
                        )
                    },
                    |ins| {
                        ref_binary_connect_affine(
                            ref_input(ins, 0),
                            ref_input(ins, 1),
                            ins[3].as_ref(),
                            axis,
                            -1.0,
                        )
                    },
                );
                if let Err(e) = result {
                    panic!(
                        "{} [{}] base_axis={} weight_shape={:?} bias={}: {}",
                        func_name, ctx, base_axis, weight_shape, with_bias, e
                    );
                }
            }
        }
    }
}

#[test]
fn binary_connect_affine_output_shapes() {
    setup();
    let mut rng = StdRng::seed_from_u64(SEED);
    let x = randn_f64(&[2, 3, 4], &mut rng);
    for (base_axis, weight_shape) in CASES {
        let w = randn_f64(weight_shape, &mut rng);
        let wb = zeros_f64(weight_shape).unwrap();
        let y = binary_connect_affine_op(&x, &w, &wb, None, &BinaryConnectAffineConfig::new(base_axis))
            .unwrap();
        let mut expected = vec![2, 3, 4][..base_axis as usize].to_vec();
        expected.extend_from_slice(&weight_shape[1..]);
        assert_eq!(y.shape(), expected);
        assert!(wb.get_f64_data().unwrap().iter().all(|v| *v == 1.0 || *v == -1.0));
    }
}
