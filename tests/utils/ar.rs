//! Minimal SysV/GNU archive writer for link tests.

/// Builds an archive from `(member name, member data)` pairs with a symbol
/// index mapping each `(symbol, member ordinal)` to its member.
pub fn archive(members: &[(&str, Vec<u8>)], symbols: &[(&str, usize)]) -> Vec<u8> {
    // The symbol table data must be sized before member offsets are known.
    let symtab_size: usize =
        4 + 4 * symbols.len() + symbols.iter().map(|(name, _)| name.len() + 1).sum::<usize>();

    // Global header, then the symbol table member, then the others; every
    // member starts on an even offset.
    let mut member_offsets = Vec::with_capacity(members.len());
    let mut offset = 8 + 60 + symtab_size + symtab_size % 2;
    for (_, data) in members {
        member_offsets.push(offset as u32);
        offset += 60 + data.len() + data.len() % 2;
    }

    let mut symtab = Vec::with_capacity(symtab_size);
    symtab.extend_from_slice(&(symbols.len() as u32).to_be_bytes());
    for &(_, member) in symbols {
        symtab.extend_from_slice(&member_offsets[member].to_be_bytes());
    }
    for &(name, _) in symbols {
        symtab.extend_from_slice(name.as_bytes());
        symtab.push(0);
    }

    let mut buf = Vec::with_capacity(offset);
    buf.extend_from_slice(b"!<arch>\n");
    push_member(&mut buf, "/", &symtab);
    for (name, data) in members {
        push_member(&mut buf, &format!("{name}/"), data);
    }
    buf
}

fn push_member(buf: &mut Vec<u8>, name: &str, data: &[u8]) {
    assert!(name.len() <= 16, "long archive member names are unsupported");
    let header = format!(
        "{name:<16}{mtime:<12}{uid:<6}{gid:<6}{mode:<8}{size:<10}`\n",
        mtime = 0,
        uid = 0,
        gid = 0,
        mode = 0,
        size = data.len(),
    );
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(data);
    if data.len() % 2 != 0 {
        buf.push(b'\n');
    }
}
