use std::fmt::Write;

use crate::{fs::MockFile, Error};

use super::{reader::Reader, writer::Writer};

fn show(b: &[u8]) -> String {
    format!("{:?}", String::from_utf8_lossy(b))
}

// Input lines hold double-quoted tokens separated by spaces, e.g. `"apple" "pie"`.
fn tokens(line: &str) -> Vec<Vec<u8>> {
    line.split_whitespace()
        .map(|t| t.trim_matches('"').as_bytes().to_vec())
        .collect()
}

fn error(e: Error) -> String {
    format!("error: {}\n", e)
}

#[test]
fn test_sst_trace() {
    datadriven::walk("src/sst/testdata/", |f| {
        let mut file = MockFile::new();
        let mut writer = Writer::new(file.clone());
        let mut reader: Option<Reader<MockFile>> = None;

        f.run(|test_case| match test_case.directive.as_str() {
            "new" => {
                file = MockFile::new();
                writer = Writer::new(file.clone());
                reader = None;
                "ok\n".into()
            }
            "put" => {
                for line in test_case.input.lines() {
                    let kv = tokens(line);
                    if let Err(e) = writer.put(&kv[0], &kv[1]) {
                        return error(e);
                    }
                }
                "ok\n".into()
            }
            "finalize" => match writer.finalize() {
                Ok(()) => "ok\n".into(),
                Err(e) => error(e),
            },
            "finalize-bare" => match writer.finalize_without_index() {
                Ok(()) => "ok\n".into(),
                Err(e) => error(e),
            },
            "trace" => {
                let mut out = String::new();
                for event in file.take_events() {
                    event.write_abbrev(&mut out).unwrap();
                    out.push('\n');
                }
                out
            }
            "hexdump" => {
                let mut out = String::new();
                for chunk in file.contents().chunks(16) {
                    let line: Vec<_> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
                    writeln!(&mut out, "{}", line.join(" ")).unwrap();
                }
                out
            }
            "truncate" => {
                let len = test_case
                    .args
                    .get("len")
                    .expect("truncate requires len argument")
                    .get(0)
                    .unwrap()
                    .parse()
                    .unwrap();
                file.truncate(len);
                "ok\n".into()
            }
            "open" => match Reader::open(file.reopen()) {
                Ok(r) => {
                    let out = format!(
                        "source={} keys={} data_len={}\n",
                        serde_json::to_value(r.index_source())
                            .unwrap()
                            .as_str()
                            .unwrap(),
                        r.len(),
                        r.data_len()
                    );
                    reader = Some(r);
                    out
                }
                Err(e) => {
                    reader = None;
                    error(e)
                }
            },
            "get" => {
                let r = reader.as_mut().expect("get requires an open reader");
                let mut out = String::new();
                for line in test_case.input.lines() {
                    let key = tokens(line).remove(0);
                    match r.get(&key) {
                        Ok(values) => {
                            let values: Vec<_> = values
                                .iter()
                                .map(|v| String::from_utf8_lossy(v).into_owned())
                                .collect();
                            writeln!(&mut out, "{}: {:?}", show(&key), values).unwrap();
                        }
                        Err(e) if e.is_not_found() => {
                            writeln!(&mut out, "{}: not found", show(&key)).unwrap();
                        }
                        Err(e) => return error(e),
                    }
                }
                out
            }
            "lookup" => {
                let r = reader.as_ref().expect("lookup requires an open reader");
                let mut out = String::new();
                for line in test_case.input.lines() {
                    let key = tokens(line).remove(0);
                    match r.lookup(&key) {
                        Ok(offsets) => writeln!(&mut out, "{}: {:?}", show(&key), offsets).unwrap(),
                        Err(e) if e.is_not_found() => {
                            writeln!(&mut out, "{}: not found", show(&key)).unwrap();
                        }
                        Err(e) => return error(e),
                    }
                }
                out
            }
            "fetch" => {
                let r = reader.as_mut().expect("fetch requires an open reader");
                let offset = test_case
                    .args
                    .get("offset")
                    .expect("fetch requires offset argument")
                    .get(0)
                    .unwrap()
                    .parse()
                    .unwrap();
                match r.fetch_at(offset) {
                    Ok((k, v)) => format!("{} = {}\n", show(&k), show(&v)),
                    Err(e) => error(e),
                }
            }
            "stats" => {
                let r = reader.as_ref().expect("stats requires an open reader");
                format!("{}\n", serde_json::to_string(&r.stats()).unwrap())
            }
            _ => {
                panic!("unhandled: {}", test_case.directive);
            }
        })
    })
}
