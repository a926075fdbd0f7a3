//! The three stages of an iteration, reading lines from a `BufRead` and writing lines to a `Write`.
//!
//! Each stage processes a single partition. The input of the combiner and of the reducer must be
//! grouped by key; the input of the mapper can be in any order.
use std::io::{BufRead, Write};

use crate::config::{MapperConfig, ReducerConfig};
use crate::execution::{StageError, StageReport};
use crate::operator::sink::Sink;
use crate::operator::source::LineSource;
use crate::record::{IntermediateRecord, NodeRecord};
use crate::stream::{StageContext, Stream};

pub const MAP_STAGE: &str = "map";
pub const COMBINE_STAGE: &str = "combine";
pub const REDUCE_STAGE: &str = "reduce";

/// Build the chain of the mapper without running it.
pub fn mapper<R: BufRead, W: Write>(
    ctx: &StageContext,
    config: MapperConfig,
    reader: R,
    writer: W,
) -> Stream<impl Sink> {
    ctx.stream(LineSource::new(reader))
        .parse::<NodeRecord>()
        .contributions(config)
        .write_lines(writer)
}

/// Build the chain of the combiner without running it.
pub fn combiner<R: BufRead, W: Write>(ctx: &StageContext, reader: R, writer: W) -> Stream<impl Sink> {
    ctx.stream(LineSource::new(reader))
        .parse::<IntermediateRecord>()
        .combine()
        .write_lines(writer)
}

/// Build the chain of the reducer without running it.
pub fn reducer<R: BufRead, W: Write>(
    ctx: &StageContext,
    config: ReducerConfig,
    reader: R,
    writer: W,
) -> Stream<impl Sink> {
    ctx.stream(LineSource::new(reader))
        .parse::<IntermediateRecord>()
        .reduce_ranks(config)
        .write_lines(writer)
}

fn finish(stage: &str, result: Result<StageReport, StageError>) -> Result<StageReport, StageError> {
    match &result {
        Ok(report) => info!("{stage}: {report}"),
        Err(e) => warn!("{stage}: aborted: {e}"),
    }
    result
}

/// Run the mapper on a whole partition.
///
/// Every node record produces its `ADJ` record and one `PR` record per outgoing edge.
pub fn map_stage<R: BufRead, W: Write>(
    config: MapperConfig,
    reader: R,
    writer: W,
) -> Result<StageReport, StageError> {
    let ctx = StageContext::new(MAP_STAGE);
    finish(MAP_STAGE, mapper(&ctx, config, reader, writer).execute())
}

/// Run the combiner on a key-grouped partition.
pub fn combine_stage<R: BufRead, W: Write>(reader: R, writer: W) -> Result<StageReport, StageError> {
    let ctx = StageContext::new(COMBINE_STAGE);
    finish(COMBINE_STAGE, combiner(&ctx, reader, writer).execute())
}

/// Run the reducer on a key-grouped partition, emitting one `node\trank\tadjacency` line per
/// group.
pub fn reduce_stage<R: BufRead, W: Write>(
    config: ReducerConfig,
    reader: R,
    writer: W,
) -> Result<StageReport, StageError> {
    let ctx = StageContext::new(REDUCE_STAGE);
    finish(REDUCE_STAGE, reducer(&ctx, config, reader, writer).execute())
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufRead, Read};

    use crate::config::{MapperConfig, ReducerConfig};
    use crate::execution::StageError;
    use crate::operator::IntegrityError;
    use crate::stage::{combine_stage, map_stage, reduce_stage};

    fn run<F>(input: &str, stage: F) -> (String, crate::StageReport)
    where
        F: FnOnce(&[u8], &mut Vec<u8>) -> Result<crate::StageReport, StageError>,
    {
        let mut output = Vec::new();
        let report = stage(input.as_bytes(), &mut output).unwrap();
        (String::from_utf8(output).unwrap(), report)
    }

    #[test]
    fn map_first_iteration() {
        let config = MapperConfig::new(3).unwrap();
        let (out, report) = run("A\tB\nB\tC\nC\t\n", |r, w| map_stage(config, r, w));
        assert_eq!(
            out,
            "A\tADJ\tB\n\
             B\tPR\t0.3333333333333333\n\
             B\tADJ\tC\n\
             C\tPR\t0.3333333333333333\n\
             C\tADJ\t\n"
        );
        assert_eq!(report.lines_read, 3);
        assert_eq!(report.records_out, 5);
    }

    #[test]
    fn map_skips_malformed_lines() {
        let config = MapperConfig::new(2).unwrap();
        let input = "A\t0.5\tB\nonlyonefield\nB\tnan\tA\n\nB\t0.5\tA\r\n";
        let (out, report) = run(input, |r, w| map_stage(config, r, w));
        assert_eq!(out, "A\tADJ\tB\nB\tPR\t0.5\nB\tADJ\tA\nA\tPR\t0.5\n");
        assert_eq!(report.lines_read, 4);
        assert_eq!(report.malformed, 2);
    }

    #[test]
    fn combine_partition() {
        let input = "A\tADJ\tB\nA\tPR\t0.25\nA\tPR\t0.25\nB\tPR\t0.5\n";
        let (out, report) = run(input, |r, w| combine_stage(r, w));
        assert_eq!(out, "A\tADJ\tB\nA\tPR\t0.5\nB\tPR\t0.5\n");
        assert_eq!(report.groups, 2);
    }

    #[test]
    fn reduce_partition() {
        let config = ReducerConfig::new(0.85, 4).unwrap();
        let input = "A\tADJ\tB,C\nA\tPR\t0.25\nD\tADJ\t\n";
        let (out, report) = run(input, |r, w| reduce_stage(config, r, w));
        // 0.0375 + 0.85 * 0.25
        assert_eq!(out, "A\t0.250000\tB,C\nD\t0.037500\t\n");
        assert_eq!(report.groups, 2);
        assert_eq!(report.records_out, 2);
    }

    #[test]
    fn malformed_line_inside_a_group() {
        let input = "A\tPR\t0.25\ngarbage\nA\tPR\t0.25\n";
        let (out, report) = run(input, |r, w| combine_stage(r, w));
        assert_eq!(out, "A\tPR\t0.5\n");
        assert_eq!(report.malformed, 1);
        assert_eq!(report.groups, 1);

        let config = ReducerConfig::new(0.85, 4).unwrap();
        let input = "A\tADJ\tB\ngarbage\nA\tPR\t0.25\n";
        let (out, report) = run(input, |r, w| reduce_stage(config, r, w));
        assert_eq!(out, "A\t0.250000\tB\n");
        assert_eq!(report.malformed, 1);
        assert_eq!(report.groups, 1);
    }

    #[test]
    fn overflowing_contributions_fail_the_stage() {
        let input = "A\tPR\t1e308\nA\tPR\t1e308\n";
        let mut output = Vec::new();
        let result = combine_stage(input.as_bytes(), &mut output);
        match result {
            Err(StageError::Integrity(IntegrityError::SumOverflow { node })) => {
                assert_eq!(node, "A")
            }
            other => panic!("expected an overflow error, got {other:?}"),
        }
        assert!(output.is_empty());

        let config = ReducerConfig::new(0.85, 4).unwrap();
        let input = "A\tADJ\t\nA\tPR\t1e308,1e308\n";
        let result = reduce_stage(config, input.as_bytes(), &mut Vec::new());
        assert!(matches!(
            result,
            Err(StageError::Integrity(IntegrityError::SumOverflow { .. }))
        ));
    }

    #[test]
    fn empty_partition() {
        let config = ReducerConfig::new(0.85, 4).unwrap();
        let (out, report) = run("", |r, w| reduce_stage(config, r, w));
        assert!(out.is_empty());
        assert_eq!(report, Default::default());
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device unplugged"))
        }
    }

    #[test]
    fn read_error_fails_the_stage() {
        let reader: Box<dyn BufRead> = Box::new(io::BufReader::new(BrokenReader));
        let mut output = Vec::new();
        let result = combine_stage(reader, &mut output);
        assert!(matches!(result, Err(StageError::Io(_))));
    }
}
