use super::prelude::*;
use crate::protocol::mem_codec::{pack_group, BLOCK_CHARS};
use crate::protocol::{decode_hex_pairs, MemFlags};

/// Evaluate `<addr> <size> [<flags>]`, where the flags are only present if
/// `with_flags` is set.
fn eval_range<T: Target>(
    target: &mut T,
    args: &[&str],
    with_flags: bool,
) -> Result<(u32, u32, MemFlags), crate::expr::EvalError> {
    let eval = TargetEval::new(target);
    let addr = eval.eval(args[0])?;
    let size = eval.eval(args[1])?;
    let flags = if with_flags {
        MemFlags::from_bits_truncate(eval.eval(args[2])?)
    } else {
        MemFlags::PHYSICAL
    };
    Ok((addr, size, flags))
}

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    pub(crate) fn handle_mem(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let args = args.as_split();
        if args.len() < 2 {
            return Err(Error::reject("mem: expected <addr> <size> [<flags>]"));
        }
        let (addr, size, flags) = eval_range(target, args, args.len() >= 3)?;

        res.write_str("OK")?;
        res.write_sep()?;
        res.write_num(addr)?;
        res.write_sep()?;
        res.write_num(size)?;
        res.write_sep()?;

        // the packed data bypasses the send buffer, and carries no
        // separators of its own
        let mut block = Vec::with_capacity(BLOCK_CHARS);
        let mut read_pos = 0u64;
        while read_pos < size as u64 {
            let mut group = [0; 3];
            for b in group.iter_mut() {
                if read_pos < size as u64 {
                    *b = target.read_byte(flags, addr.wrapping_add(read_pos as u32));
                }
                read_pos += 1;
            }
            block.extend_from_slice(&pack_group(group));

            if block.len() == BLOCK_CHARS {
                res.write_unbuffered(&block)?;
                block.clear();
            }
        }
        if !block.is_empty() {
            res.write_unbuffered(&block)?;
        }

        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_memset(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let args = args.as_split();
        if args.len() < 3 {
            return Err(Error::reject("memset: expected <addr> <size> [<flags>] <hex>"));
        }
        let with_flags = args.len() >= 4;
        let (addr, size, flags) = eval_range(target, args, with_flags)?;
        let data = decode_hex_pairs(args[if with_flags { 3 } else { 2 }].as_bytes());

        // bytes before a malformed pair stay written
        for i in 0..size {
            let val = *data
                .get(i as usize)
                .ok_or_else(|| Error::reject("memset: malformed hex data"))?;
            target.write_byte(flags, addr.wrapping_add(i), val);
        }

        res.write_str("OK")?;
        res.write_sep()?;
        res.write_num(addr)?;
        res.write_sep()?;
        res.write_num(size)?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_memfind(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
        args: &Args<'_>,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        let args = args.as_split();
        if args.len() < 3 {
            return Err(Error::reject("memfind: expected <addr> <size> <hex>"));
        }
        let (start, count, _) = eval_range(target, args, false)?;

        // (mask, value) pairs, read until the first malformed hex pair
        let pattern = decode_hex_pairs(args[2].as_bytes());
        if pattern.len() % 2 != 0 {
            return Err(Error::reject("memfind: odd number of pattern bytes"));
        }

        res.write_str("OK")?;

        let len = (pattern.len() / 2) as u64;
        let end = (start as u64 + count as u64).saturating_sub(len);
        let found = (start as u64..end).find(|&at| {
            pattern.chunks(2).enumerate().all(|(i, pair)| {
                let mem = target.read_byte(MemFlags::PHYSICAL, (at + i as u64) as u32);
                mem & pair[0] == pair[1]
            })
        });

        if let Some(at) = found {
            res.write_sep()?;
            res.write_num(at as u32)?;
        }
        Ok(HandlerStatus::Handled)
    }
}
