use super::toy_sla;
use crate::*;

#[test]
fn register_round_trip() -> Result<()> {
    let sleigh = SleighContext::new(toy_sla())?;
    let registers = sleigh.all_registers();
    assert_eq!(registers.len(), 3);

    for entry in &registers {
        assert_eq!(sleigh.lookup_register(&entry.name)?, entry.location);
        assert_eq!(sleigh.register_at(&entry.location)?, entry.name);
    }

    Ok(())
}

#[test]
fn registers_ordered_by_location() -> Result<()> {
    let sleigh = SleighContext::new(toy_sla())?;
    let names: Vec<_> = sleigh
        .all_registers()
        .into_iter()
        .map(|entry| entry.name)
        .collect();

    // Same offset orders by size
    assert_eq!(names, vec!["R0L", "R0", "R1"]);

    let map = sleigh.register_name_map();
    assert_eq!(map.values().collect::<Vec<_>>(), vec!["R0L", "R0", "R1"]);
    Ok(())
}

#[test]
fn unknown_register() -> Result<()> {
    let sleigh = SleighContext::new(toy_sla())?;
    assert!(matches!(
        sleigh.lookup_register("R9"),
        Err(Error::UnknownRegister(name)) if name == "R9"
    ));
    assert!(sleigh.register_from_name("r0").is_err());
    Ok(())
}

#[test]
fn exact_location_only() -> Result<()> {
    let sleigh = SleighContext::new(toy_sla())?;
    let r1 = sleigh.lookup_register("R1")?;

    // Low half of R1 is not a declared register
    let partial = VarnodeData::new(r1.address, 2);
    assert!(matches!(
        sleigh.register_at(&partial),
        Err(Error::NoRegisterAtLocation(location)) if location == partial
    ));
    assert_eq!(sleigh.register_name(&partial), None);
    assert_eq!(sleigh.register_name(&r1).as_deref(), Some("R1"));
    Ok(())
}
