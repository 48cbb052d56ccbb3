//! Property tests for black-box tiling metadata.

use std::any::Any;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use proptest::prelude::*;
use tessel_core::{ChunkIndex, NSplits, NodeParams, OpKey, OutputType, Shape};
use tessel_graph::ops::DataSource;
use tessel_graph::{
    BlackBoxOperand, BlackBoxTiler, ChunkRef, LoweredInputs, OpType, Operand, OperandRef,
    TileContext, TileStep, TileableData, TileableRef, OPERAND,
};

static OPAQUE: OpType = OpType::derived("Opaque", &OPERAND);

#[derive(Debug, Clone)]
struct Opaque {
    key: OpKey,
    inputs: Vec<TileableRef>,
    output_types: Vec<OutputType>,
    chunk_inputs: Vec<ChunkRef>,
}

impl Operand for Opaque {
    fn op_type(&self) -> &'static OpType {
        &OPAQUE
    }
    fn key(&self) -> OpKey {
        self.key
    }
    fn inputs(&self) -> &[TileableRef] {
        &self.inputs
    }
    fn chunk_inputs(&self) -> &[ChunkRef] {
        &self.chunk_inputs
    }
    fn output_types(&self) -> &[OutputType] {
        &self.output_types
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BlackBoxOperand for Opaque {
    fn needs_execution(&self, input: &TileableRef) -> bool {
        input.output_type().is_distributed()
    }
    fn is_pure_dependency(&self, _input: &TileableRef) -> bool {
        false
    }
    fn to_chunk_op(&self, lowered: LoweredInputs) -> OperandRef {
        Arc::new(Self {
            key: OpKey::generate(),
            chunk_inputs: lowered.chunk_inputs,
            ..self.clone()
        })
    }
}

fn arb_output_type() -> impl Strategy<Value = OutputType> {
    prop_oneof![
        Just(OutputType::Object),
        Just(OutputType::Scalar),
        Just(OutputType::Tensor),
        Just(OutputType::DataFrame),
        Just(OutputType::Series),
        Just(OutputType::Index),
        Just(OutputType::DfOrSeries),
    ]
}

fn series_source(blocks: usize) -> TileableRef {
    let blocks: Vec<ArrayRef> = (0..blocks)
        .map(|i| Arc::new(Int64Array::from(vec![i as i64])) as ArrayRef)
        .collect();
    DataSource::series_blocks("s", blocks).unwrap()
}

fn drive(cx: &mut TileContext, op: Opaque, outputs: &[TileableRef]) -> Vec<TileableRef> {
    let mut task = BlackBoxTiler::boxed(op, outputs);
    loop {
        match task.resume(cx).unwrap() {
            TileStep::NeedsInputExecution(keys) => {
                for key in keys {
                    cx.mark_executed(key);
                }
            }
            TileStep::Done(tiled) => return tiled,
        }
    }
}

proptest! {
    #[test]
    fn test_one_unknown_chunk_per_output(
        input_blocks in proptest::collection::vec(1usize..6, 0..4),
        output_types in proptest::collection::vec(arb_output_type(), 1..4),
    ) {
        let mut cx = TileContext::new();
        let sources: Vec<TileableRef> = input_blocks.iter().map(|&n| series_source(n)).collect();
        for source in &sources {
            let mut task = source.op().tile(std::slice::from_ref(source)).unwrap();
            match task.resume(&cx).unwrap() {
                TileStep::Done(tiled) => tiled.into_iter().for_each(|t| cx.insert_tiled(t)),
                step => panic!("unexpected step {step:?}"),
            }
        }

        let op = Opaque {
            key: OpKey::generate(),
            inputs: sources,
            output_types: output_types.clone(),
            chunk_inputs: vec![],
        };
        let shared: OperandRef = Arc::new(op.clone());
        let outputs: Vec<TileableRef> = output_types
            .iter()
            .enumerate()
            .map(|(i, ot)| TileableData::new(shared.clone(), *ot, i, NodeParams::default()))
            .collect();

        let tiled = drive(&mut cx, op, &outputs);
        prop_assert_eq!(tiled.len(), output_types.len());
        let total_blocks: usize = input_blocks.iter().sum();
        for (t, ot) in tiled.iter().zip(&output_types) {
            let ndim = ot.chunk_ndim();
            prop_assert_eq!(t.chunks().len(), 1);
            let chunk = &t.chunks()[0];
            prop_assert_eq!(chunk.index(), &ChunkIndex::zeros(ndim));
            prop_assert_eq!(&chunk.params().shape, &Shape::unknown(ndim));
            prop_assert_eq!(t.nsplits().unwrap(), &NSplits::single_unknown(ndim));
            prop_assert!(t.nsplits().unwrap().contains(chunk.index()));
            prop_assert_eq!(chunk.op().chunk_inputs().len(), total_blocks);
        }
    }
}
