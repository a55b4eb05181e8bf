use assert_cmd::Command;

pub fn ticktask_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("ticktask").expect("ticktask test binary should build")
    }
}
