//! Path canonicalization.
//!
//! Node identity is the canonicalized path string, so two manifest or
//! depfile references like `./foo/../a.h` and `a.h` resolve to the same
//! node.  This is purely lexical; symlinks are not consulted.

fn is_sep(c: u8) -> bool {
    c == b'/' || c == b'\\'
}

/// Canonicalize a path in place: normalize `\` to `/`, strip `./`
/// components, collapse runs of `/` and `component/..` pairs, and trim a
/// trailing `/.`.  A path that cancels out entirely becomes `.`.
pub fn canon_path_fast(path: &mut String) {
    assert!(!path.is_empty());
    // Safety: bytes are examined and copied one component at a time, and
    // the separators and dots driving the rewrite are ASCII, so the buffer
    // remains valid UTF-8 throughout.
    let buf = unsafe { path.as_mut_vec() };
    let len = buf.len();

    // Offsets of component starts in the output, for `..` to pop back to.
    let mut parents: Vec<usize> = Vec::new();
    let mut src = 0;
    let mut dst = 0;

    if is_sep(buf[0]) {
        buf[0] = b'/';
        src = 1;
        dst = 1;
    }

    while src < len {
        if is_sep(buf[src]) {
            src += 1;
            continue;
        }
        if buf[src] == b'.' {
            if src + 1 == len {
                // Trailing "." component; trim it and the separator before it.
                if dst > 1 && buf[dst - 1] == b'/' {
                    dst -= 1;
                }
                break;
            }
            if is_sep(buf[src + 1]) {
                src += 2;
                continue;
            }
            if buf[src + 1] == b'.' && (src + 2 == len || is_sep(buf[src + 2])) {
                // A ".." component: back up one output component if there is
                // one, otherwise keep the ".." (the path escapes its root).
                match parents.pop() {
                    Some(ofs) => dst = ofs,
                    None => {
                        buf[dst] = b'.';
                        buf[dst + 1] = b'.';
                        dst += 2;
                        if src + 2 < len {
                            buf[dst] = b'/';
                            dst += 1;
                        }
                    }
                }
                src += 3;
                continue;
            }
            // A component that merely starts with '.'; copy it as usual.
        }

        parents.push(dst);
        while src < len {
            let c = buf[src];
            src += 1;
            if is_sep(c) {
                buf[dst] = b'/';
                dst += 1;
                break;
            }
            buf[dst] = c;
            dst += 1;
        }
    }

    if dst == 0 {
        buf.clear();
        buf.push(b'.');
    } else {
        buf.truncate(dst);
    }
}

#[must_use = "this returns the canonicalized path; for in-place use prefer `canon_path_fast`"]
pub fn canon_path(path: impl Into<String>) -> String {
    let mut path = path.into();
    canon_path_fast(&mut path);
    path
}
