use phf::{Map, Set, phf_map, phf_set};

static ONE_LETTER_CODES: Map<&'static str, char> = phf_map! {
    "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
    "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
    "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
    "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',
    "MSE" => 'M', "SEC" => 'U', "PYL" => 'O', "HSD" => 'H', "HSE" => 'H', "HSP" => 'H',
};

static WATER_NAMES: Set<&'static str> = phf_set! { "HOH", "WAT", "DOD", "H2O" };

/// Residue names of hexopyranoses that occur as C-linked mannose.
static C_MANNOSE_NAMES: Set<&'static str> = phf_set! { "MAN", "BMA" };

static TWO_LETTER_ELEMENTS: Set<&'static str> = phf_set! {
    "SE", "CL", "BR", "FE", "ZN", "MG", "MN", "CA", "NA", "CU", "CO", "NI", "CD", "HG",
};

/// Electrons per neutral atom for the elements commonly found in macromolecular models.
static ELECTRON_COUNTS: Map<&'static str, f64> = phf_map! {
    "H" => 1.0, "D" => 1.0, "C" => 6.0, "N" => 7.0, "O" => 8.0, "P" => 15.0,
    "S" => 16.0, "SE" => 34.0, "NA" => 11.0, "MG" => 12.0, "CL" => 17.0,
    "CA" => 20.0, "MN" => 25.0, "FE" => 26.0, "ZN" => 30.0,
};

pub fn one_letter_code(residue_name: &str) -> Option<char> {
    ONE_LETTER_CODES.get(residue_name.trim()).copied()
}

pub fn is_water(residue_name: &str) -> bool {
    WATER_NAMES.contains(residue_name.trim())
}

pub fn is_c_mannose(residue_name: &str) -> bool {
    C_MANNOSE_NAMES.contains(residue_name.trim())
}

pub fn electron_count(element: &str) -> f64 {
    ELECTRON_COUNTS.get(element.trim()).copied().unwrap_or(6.0)
}

/// Guesses the element symbol from a PDB atom name.
///
/// Two-letter symbols are only recognised when they make up the whole name (e.g. "SE",
/// "ZN"). "CA" is always read as a carbon alpha. Leading digits are ignored.
pub fn element_from_atom_name(atom_name: &str) -> String {
    let name = atom_name.trim().trim_start_matches(|c: char| c.is_ascii_digit());
    let upper = name.to_ascii_uppercase();
    if TWO_LETTER_ELEMENTS.contains(upper.as_str()) && upper != "CA" {
        return upper;
    }
    upper
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_string())
        .unwrap_or_default()
}
