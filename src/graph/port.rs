//! Port descriptors for components.
//!
//! Each component declares its ports via a static `PortDescriptor` array.
//! The graph builder uses these to validate edge connections.

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// How many edges may attach to a declared port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Exactly one edge
    One,
    /// Zero or one edge
    Optional,
    /// Any number of edges, numbered consecutively from this port on
    Many,
}

/// Static descriptor for a component's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: &'static str,
    pub direction: PortDirection,
    pub multiplicity: Multiplicity,
}

impl PortDescriptor {
    pub const fn input(name: &'static str, multiplicity: Multiplicity) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            multiplicity,
        }
    }

    pub const fn output(name: &'static str, multiplicity: Multiplicity) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            multiplicity,
        }
    }
}

/// Check the connected port numbers of one direction against the declaration.
///
/// `connected` must be sorted. Ports must be numbered densely from 0.
pub fn validate_ports(
    descriptors: &[PortDescriptor],
    direction: PortDirection,
    connected: &[usize],
) -> Result<(), String> {
    let label = match direction {
        PortDirection::Input => "input",
        PortDirection::Output => "output",
    };

    for (expected, &actual) in connected.iter().enumerate() {
        if expected != actual {
            return Err(format!(
                "{} ports must be numbered from 0 without gaps, found port {} where {} was expected",
                label, actual, expected
            ));
        }
    }

    let declared: Vec<&PortDescriptor> = descriptors
        .iter()
        .filter(|d| d.direction == direction)
        .collect();
    let required = declared
        .iter()
        .take_while(|d| d.multiplicity == Multiplicity::One)
        .count();
    let unbounded = declared.iter().any(|d| d.multiplicity == Multiplicity::Many);
    let count = connected.len();

    if count < required {
        let missing = declared[count].name;
        return Err(format!(
            "{} port {} ('{}') is required but not connected",
            label, count, missing
        ));
    }
    if !unbounded && count > declared.len() {
        return Err(format!(
            "{} {} ports connected, at most {} declared",
            count,
            label,
            declared.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    static DEDUP_LIKE: &[PortDescriptor] = &[
        PortDescriptor::input("in", Multiplicity::One),
        PortDescriptor::output("out", Multiplicity::One),
        PortDescriptor::output("reject", Multiplicity::Optional),
    ];

    static GATHER_LIKE: &[PortDescriptor] = &[
        PortDescriptor::input("in", Multiplicity::Many),
        PortDescriptor::output("out", Multiplicity::One),
    ];

    #[test]
    fn test_required_and_optional() {
        assert!(validate_ports(DEDUP_LIKE, PortDirection::Output, &[0]).is_ok());
        assert!(validate_ports(DEDUP_LIKE, PortDirection::Output, &[0, 1]).is_ok());
        assert!(validate_ports(DEDUP_LIKE, PortDirection::Output, &[0, 1, 2]).is_err());
        let err = validate_ports(DEDUP_LIKE, PortDirection::Input, &[]).unwrap_err();
        assert!(err.contains("'in'"));
    }

    #[test]
    fn test_many_and_gaps() {
        assert!(validate_ports(GATHER_LIKE, PortDirection::Input, &[0, 1, 2, 3]).is_ok());
        assert!(validate_ports(GATHER_LIKE, PortDirection::Input, &[]).is_ok());
        assert!(validate_ports(GATHER_LIKE, PortDirection::Input, &[0, 2]).is_err());
    }
}
