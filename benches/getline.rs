#[macro_use]
extern crate criterion;
extern crate scan_io;

use criterion::Criterion;
use scan_io::{ScanResult, Scanner};
use std::io::BufRead;
use std::iter::repeat;

/// number of lines for all benchmarks
const N: usize = 10_000;

fn with_linelen(nlines: usize, len: usize) -> Vec<u8> {
    let line: Vec<u8> = repeat(b'a').take(len).chain(Some(b'\n')).collect();
    let mut out = Vec::with_capacity(nlines * line.len());
    for _ in 0..nlines {
        out.extend_from_slice(&line);
    }
    out
}

macro_rules! bench_base {
    ($c:expr, $name:expr, $input_data:expr, $data:ident, $code:block) => {
        let name = format!("getline {} {}", $name, $input_data.len());
        $c.bench_function(&name, move |b| {
            b.iter(|| {
                let $data = $input_data.as_slice();
                $code
            });
        });
    };
}

fn bench_readers(c: &mut Criterion) {
    for &len in &[80usize, 500] {
        let input = with_linelen(N, len);
        bench_base!(c, format!("scanner {}b", len), input, data, {
            let mut scanner = Scanner::new(data).unwrap();
            let mut total = 0usize;
            loop {
                match scanner.getline() {
                    ScanResult::FullLine(l) => total += l.len(),
                    ScanResult::Eof => break,
                    _ => unreachable!(),
                }
            }
            assert_eq!(total, (len + 1) * N);
        });

        let input = with_linelen(N, len);
        bench_base!(c, format!("read_until {}b", len), input, data, {
            let mut data = data;
            let mut line = Vec::with_capacity(len + 1);
            let mut total = 0usize;
            loop {
                line.clear();
                let n = data.read_until(b'\n', &mut line).unwrap();
                if n == 0 {
                    break;
                }
                total += n;
            }
            assert_eq!(total, (len + 1) * N);
        });
    }

    // lines far beyond the buffer, delivered in chunks
    let input = with_linelen(20, 500_000);
    bench_base!(c, "scanner chunked 500kb", input, data, {
        let mut scanner = Scanner::with_capacity(data, 64 * 1024).unwrap();
        let mut total = 0usize;
        loop {
            match scanner.getline() {
                ScanResult::FullLine(l)
                | ScanResult::LongLineStart(l)
                | ScanResult::LongLineMid(l) => total += l.len(),
                ScanResult::LongLineEnd => {}
                ScanResult::Eof => break,
                _ => unreachable!(),
            }
        }
        assert_eq!(total, 500_001 * 20);
    });
}

criterion_group!(benches, bench_readers);
criterion_main!(benches);
