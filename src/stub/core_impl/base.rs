use super::prelude::*;
use crate::expr::{Register, CORE_REGISTERS};

impl<'a, T: Target, C: Connection> RdbStubImpl<'a, T, C> {
    pub(crate) fn handle_status(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        res.write_str("OK")?;
        res.write_sep()?;
        res.write_num(!self.break_active as u8)?;
        res.write_sep()?;
        res.write_num(target.pc())?;
        Ok(HandlerStatus::Handled)
    }

    pub(crate) fn handle_break(&mut self) -> Result<HandlerStatus, Error<C::Error>> {
        // only meaningful while running
        if self.break_active {
            return Err(Error::reject("already in break"));
        }
        self.break_requested = true;
        Ok(HandlerStatus::NeedsOk)
    }

    pub(crate) fn handle_step(&mut self, target: &mut T) -> Result<HandlerStatus, Error<C::Error>> {
        target.request_single_step();
        self.break_active = false;
        Ok(HandlerStatus::NeedsOk)
    }

    pub(crate) fn handle_run(&mut self) -> Result<HandlerStatus, Error<C::Error>> {
        self.break_active = false;
        Ok(HandlerStatus::NeedsOk)
    }

    pub(crate) fn handle_regs(
        &mut self,
        res: &mut ResponseWriter<'_, C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<C::Error>> {
        use Register::*;

        res.write_str("OK")?;
        res.write_sep()?;

        for &reg in CORE_REGISTERS.iter().chain(&[Pc, Usp, Isp, Sr, Ex]) {
            res.write_key_value(reg.name(), target.read_register(reg))?;
        }

        let mut var_err = None;
        target.for_each_variable(&mut |name, val| {
            if var_err.is_none() {
                var_err = res.write_key_value(name, val).err();
            }
        });
        if let Some(e) = var_err {
            return Err(e.into());
        }

        let model = target.cpu_model();
        let mut tail: Vec<Register> = Vec::new();
        if model.cpu >= 68010 {
            tail.extend_from_slice(&[Sfc, Dfc, Vbr]);
        }
        if model.cpu >= 68020 {
            tail.extend_from_slice(&[Cacr, Msp]);
            if model.cpu < 68040 {
                tail.push(Caar);
            }
        }
        if model.mmu == 68030 {
            tail.extend_from_slice(&[Crp, Urp, Srp, Srph, Tc, Dtt0, Dtt1, Mmusr]);
        } else if model.mmu >= 68040 {
            tail.extend_from_slice(&[Urp, Srp, Tc, Dtt0, Dtt1, Itt0, Itt1, Mmusr]);
        }
        if model.mmu >= 68060 {
            tail.push(Buscr);
        }
        for reg in tail {
            res.write_key_value(reg.name(), target.read_register(reg))?;
        }

        Ok(HandlerStatus::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use crate::expr::Register;
    use crate::target::CpuModel;

    #[test]
    fn status_reports_running_and_pc() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        assert_eq!(run(&mut stub, &mut target, "status"), b"OK\x011\x01E00030\0");

        stub.break_active = true;
        assert_eq!(run(&mut stub, &mut target, "status"), b"OK\x010\x01E00030\0");
    }

    #[test]
    fn break_only_while_running() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        assert_eq!(run(&mut stub, &mut target, "break"), b"OK\0");
        assert!(stub.break_requested);

        stub.break_requested = false;
        stub.break_active = true;
        assert_eq!(run(&mut stub, &mut target, "break"), b"NG\0");
        assert!(!stub.break_requested);
    }

    #[test]
    fn step_and_run_resume() {
        let mut target = MockTarget::new();
        let mut stub = stub();

        stub.break_active = true;
        assert_eq!(run(&mut stub, &mut target, "step"), b"OK\0");
        assert_eq!(target.steps, 1);
        assert!(!stub.break_active);

        stub.break_active = true;
        assert_eq!(run(&mut stub, &mut target, "run"), b"OK\0");
        assert_eq!(target.steps, 1);
        assert!(!stub.break_active);
    }

    fn names(frame: &[u8]) -> Vec<String> {
        // OK, <empty>, then name/value pairs
        let fields: Vec<&[u8]> = frame[..frame.len() - 1].split(|&b| b == 1).collect();
        assert_eq!(fields[0], b"OK");
        assert_eq!(fields[1], b"");
        fields[2..]
            .chunks(2)
            .map(|kv| String::from_utf8(kv[0].to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn regs_plain_68000() {
        let mut target = MockTarget::new();
        let mut stub = stub();
        let out = run(&mut stub, &mut target, "regs");

        assert!(out.starts_with(b"OK\x01\x01D0\x010\x01D1\x010"));
        let text = String::from_utf8_lossy(&out).into_owned();
        assert!(text.contains("\x01A7\x017FFFE\x01PC\x01E00030\x01USP\x010\x01ISP\x010\x01SR\x012700\x01EX\x010"));
        assert!(text.contains("\x01HBL\x011234\x01VBL\x010"));

        let names = names(&out);
        assert_eq!(names.len(), 16 + 5 + 2);
        assert_eq!(names.last().map(String::as_str), Some("VBL"));
    }

    #[test]
    fn regs_tail_follows_cpu_and_mmu() {
        let mut stub = stub();

        let mut target = MockTarget::new();
        target.cpu = CpuModel {
            cpu: 68030,
            mmu: 68030,
        };
        target.regs.set(Register::Vbr, 0x400);
        let out = run(&mut stub, &mut target, "regs");
        assert_eq!(
            &names(&out)[23..],
            &["SFC", "DFC", "VBR", "CACR", "MSP", "CAAR", "CRP", "URP", "SRP", "SRPH", "TC", "DTT0", "DTT1", "MMUSR"]
        );
        assert!(String::from_utf8_lossy(&out).contains("\x01VBR\x01400\x01"));

        let mut target = MockTarget::new();
        target.cpu = CpuModel {
            cpu: 68060,
            mmu: 68060,
        };
        let out = run(&mut stub, &mut target, "regs");
        assert_eq!(
            &names(&out)[23..],
            &["SFC", "DFC", "VBR", "CACR", "MSP", "URP", "SRP", "TC", "DTT0", "DTT1", "ITT0", "ITT1", "MMUSR", "BUSCR"]
        );
    }
}
