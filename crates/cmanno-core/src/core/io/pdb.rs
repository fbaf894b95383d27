use crate::core::density::cell::UnitCell;
use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::chain::Chain;
use crate::core::models::residue::Residue;
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Structure contains no atoms")]
    Empty,
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for an ATOM/HETATM record (must reach column 54)")]
    LineTooShort,
    #[error("Invalid unit cell: {0}")]
    InvalidCell(String),
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_int(line: &str, line_num: usize, start: usize, end: usize) -> Result<isize, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidInt {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_float_or(line: &str, start: usize, end: usize, default: f64) -> f64 {
    slice_and_trim(line, start, end).parse().unwrap_or(default)
}

/// Fixed-column PDB coordinate files.
///
/// Reads `ATOM`/`HETATM`, `MODEL`/`ENDMDL`, `TER`, `CRYST1`, `SEQRES` and the
/// `REMARK   2` resolution line. Only the first alternate conformer of each atom is
/// kept.
pub struct PdbFile;

#[derive(Default)]
struct Cursor {
    model: usize,
    chain: Option<usize>,
    residue: Option<(String, isize, Option<char>, String)>,
    chain_closed: bool,
}

impl MolecularFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::default();
        let mut cursor = Cursor::default();
        let mut seen_model = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record = slice_and_trim(&line, 0, 6);

            match record {
                "HEADER" => {
                    let code = slice_and_trim(&line, 62, 66);
                    if !code.is_empty() {
                        structure.name = code.to_string();
                    }
                }
                "CRYST1" => {
                    let a = parse_float(&line, line_num, 6, 15)?;
                    let b = parse_float(&line, line_num, 15, 24)?;
                    let c = parse_float(&line, line_num, 24, 33)?;
                    let alpha = parse_float(&line, line_num, 33, 40)?;
                    let beta = parse_float(&line, line_num, 40, 47)?;
                    let gamma = parse_float(&line, line_num, 47, 54)?;
                    let cell = UnitCell::new(a, b, c, alpha, beta, gamma).map_err(|e| {
                        PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::InvalidCell(e.to_string()),
                        }
                    })?;
                    structure.cell = Some(cell);
                    let group = slice_and_trim(&line, 55, 66);
                    if !group.is_empty() {
                        structure.space_group = Some(group.to_string());
                    }
                }
                "REMARK" => {
                    if slice_and_trim(&line, 6, 10) == "2" {
                        if let Some(rest) = line.split("RESOLUTION.").nth(1) {
                            structure.resolution = rest
                                .split_whitespace()
                                .next()
                                .and_then(|v| v.parse::<f64>().ok());
                        }
                    }
                }
                "SEQRES" => {
                    let chain_id = slice_and_trim(&line, 11, 12);
                    let names = line
                        .get(19..)
                        .unwrap_or("")
                        .split_whitespace()
                        .map(str::to_string);
                    structure
                        .sequences
                        .entry(chain_id.to_string())
                        .or_default()
                        .extend(names);
                }
                "MODEL" => {
                    if seen_model {
                        cursor.model += 1;
                    }
                    seen_model = true;
                    let serial = slice_and_trim(&line, 10, 14)
                        .parse()
                        .unwrap_or(cursor.model + 1);
                    structure.model_or_insert(cursor.model).serial = serial;
                    cursor.chain = None;
                    cursor.residue = None;
                }
                "ENDMDL" => {
                    cursor.chain = None;
                    cursor.residue = None;
                }
                "TER" => {
                    cursor.chain_closed = true;
                }
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let alt_loc = line.get(16..17).unwrap_or(" ");
                    if alt_loc != " " && alt_loc != "A" {
                        continue;
                    }
                    let name = slice_and_trim(&line, 12, 16);
                    if name.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField {
                                columns: "13-16".into(),
                            },
                        });
                    }
                    let serial = slice_and_trim(&line, 6, 11).parse().unwrap_or(0);
                    let res_name = slice_and_trim(&line, 17, 20).to_string();
                    let chain_id = slice_and_trim(&line, 21, 22).to_string();
                    let seq_num = parse_int(&line, line_num, 22, 26)?;
                    let ins_code = line.get(26..27).and_then(|s| s.trim().chars().next());
                    let position = Point3::new(
                        parse_float(&line, line_num, 30, 38)?,
                        parse_float(&line, line_num, 38, 46)?,
                        parse_float(&line, line_num, 46, 54)?,
                    );

                    let model = structure.model_or_insert(cursor.model);
                    let chain_index = match cursor.chain {
                        Some(index)
                            if !cursor.chain_closed && model.chains()[index].id == chain_id =>
                        {
                            index
                        }
                        _ => {
                            cursor.chain_closed = false;
                            cursor.residue = None;
                            let index = model.push_chain(Chain::new(&chain_id));
                            cursor.chain = Some(index);
                            index
                        }
                    };
                    let chain = &mut model.chains_mut()[chain_index];

                    let residue_identity = (res_name.clone(), seq_num, ins_code, chain_id);
                    if cursor.residue.as_ref() != Some(&residue_identity) {
                        let mut residue = Residue::new(&res_name, seq_num);
                        residue.ins_code = ins_code;
                        residue.het = record == "HETATM";
                        chain.push_residue(residue);
                        cursor.residue = Some(residue_identity);
                    }

                    let mut atom = Atom::new(name, position);
                    atom.serial = serial;
                    atom.occupancy = parse_float_or(&line, 54, 60, 1.0);
                    atom.b_factor = parse_float_or(&line, 60, 66, 20.0);
                    let element = slice_and_trim(&line, 76, 78);
                    if !element.is_empty() {
                        atom = atom.with_element(element);
                    }
                    if let Some(residue) = chain.residues.last_mut() {
                        residue.add_atom(atom);
                    }
                }
                _ => {}
            }
        }

        if structure.atom_count() == 0 {
            return Err(PdbError::Empty);
        }
        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        if !structure.name.is_empty() {
            writeln!(writer, "REMARK   1 {}", structure.name)?;
        }
        if let Some(resolution) = structure.resolution {
            writeln!(
                writer,
                "REMARK   2 RESOLUTION. {:>7.2} ANGSTROMS.",
                resolution
            )?;
        }
        if let Some(cell) = &structure.cell {
            writeln!(
                writer,
                "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2} {:<11}",
                cell.a,
                cell.b,
                cell.c,
                cell.alpha,
                cell.beta,
                cell.gamma,
                structure.space_group.as_deref().unwrap_or("P 1")
            )?;
        }
        for (chain_id, names) in &structure.sequences {
            for (serial, block) in names.chunks(13).enumerate() {
                writeln!(
                    writer,
                    "SEQRES {:>3} {:1} {:>4}  {}",
                    serial + 1,
                    chain_id,
                    names.len(),
                    block
                        .iter()
                        .map(|n| format!("{n:>3}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                )?;
            }
        }

        let multi_model = structure.models().len() > 1;
        let mut serial = 0usize;
        for model in structure.models() {
            if multi_model {
                writeln!(writer, "MODEL     {:>4}", model.serial)?;
            }
            for chain in model.chains() {
                if chain.is_empty() {
                    continue;
                }
                let mut last = None;
                for residue in chain.residues() {
                    for atom in residue.atoms() {
                        serial += 1;
                        writeln!(writer, "{}", format_atom(serial, chain, residue, atom))?;
                    }
                    last = Some(residue);
                }
                if let Some(residue) = last {
                    serial += 1;
                    writeln!(
                        writer,
                        "TER   {:>5}      {:>3} {:1}{:>4}{}",
                        serial,
                        residue.name,
                        chain_column(&chain.id),
                        residue.seq_num,
                        residue.ins_code.unwrap_or(' ')
                    )?;
                }
            }
            if multi_model {
                writeln!(writer, "ENDMDL")?;
            }
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

fn chain_column(id: &str) -> char {
    id.chars().next().unwrap_or(' ')
}

fn format_atom_name(atom: &Atom) -> String {
    if atom.name.len() < 4 && atom.element.len() == 1 {
        format!(" {:<3}", atom.name)
    } else {
        format!("{:<4}", atom.name)
    }
}

fn format_atom(serial: usize, chain: &Chain, residue: &Residue, atom: &Atom) -> String {
    let record = if residue.het { "HETATM" } else { "ATOM" };
    format!(
        "{:<6}{:>5} {} {:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
        record,
        serial % 100_000,
        format_atom_name(atom),
        residue.name,
        chain_column(&chain.id),
        residue.seq_num,
        residue.ins_code.unwrap_or(' '),
        atom.position.x,
        atom.position.y,
        atom.position.z,
        atom.occupancy,
        atom.b_factor,
        atom.element
    )
}
